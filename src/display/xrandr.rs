use super::DisplayPreparer;
use crate::config::{DisplayConfig, PlaybackMode};
use crate::error::DisplayError;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Names of the outputs xrandr lists as connected, in listing order
pub fn parse_connected_outputs(xrandr_output: &str) -> Vec<String> {
    xrandr_output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            match (tokens.next(), tokens.next()) {
                (Some(name), Some("connected")) => Some(name.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Portrait layout through `xrandr`: every output gets the first configured
/// mode it accepts, rotated; in dual mode the second output sits to the
/// right of the first.
pub struct XrandrDisplay {
    binary: String,
    x_display: String,
    modes: Vec<String>,
    rotate: String,
}

impl XrandrDisplay {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            binary: "xrandr".to_string(),
            x_display: config.x_display.clone(),
            modes: config.modes.clone(),
            rotate: config.rotate.clone(),
        }
    }

    /// Use a different xrandr executable
    pub fn with_binary<S: Into<String>>(mut self, binary: S) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, args: &[String]) -> Result<String, DisplayError> {
        debug!("{} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .env("DISPLAY", &self.x_display)
            .output()
            .await
            .map_err(|e| DisplayError::Command {
                command: self.binary.clone(),
                details: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DisplayError::Command {
                command: format!("{} {}", self.binary, args.join(" ")),
                details: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn connected_outputs(&self) -> Result<Vec<String>, DisplayError> {
        let listing = self.run(&[]).await?;
        let outputs = parse_connected_outputs(&listing);
        if outputs.is_empty() {
            return Err(DisplayError::NoOutputs);
        }
        info!("Connected displays: {}", outputs.join(", "));
        Ok(outputs)
    }

    fn mode_args(&self, output: &str, mode: &str) -> Vec<String> {
        let mut args = vec![
            "--output".to_string(),
            output.to_string(),
            "--mode".to_string(),
            mode.to_string(),
        ];
        if !self.rotate.is_empty() {
            args.push("--rotate".to_string());
            args.push(self.rotate.clone());
        }
        args
    }

    async fn configure_single(&self, outputs: &[String]) -> Result<(), DisplayError> {
        for output in outputs {
            for mode in &self.modes {
                match self.run(&self.mode_args(output, mode)).await {
                    Ok(_) => {
                        info!("Set {} to {} rotated {}", output, mode, self.rotate);
                        return Ok(());
                    }
                    Err(e) => debug!("{} rejected {}: {}", output, mode, e),
                }
            }
        }

        Err(DisplayError::NoUsableMode {
            output: outputs.join(", "),
        })
    }

    async fn configure_dual(&self, outputs: &[String]) -> Result<(), DisplayError> {
        if outputs.len() < 2 {
            warn!(
                "Found only {} display(s), dual mode needs 2; configuring single",
                outputs.len()
            );
            return self.configure_single(outputs).await;
        }

        let (left, right) = (&outputs[0], &outputs[1]);

        for mode in &self.modes {
            if let Err(e) = self.run(&self.mode_args(left, mode)).await {
                debug!("{} rejected {}: {}", left, mode, e);
                continue;
            }

            let mut right_args = self.mode_args(right, mode);
            right_args.push("--right-of".to_string());
            right_args.push(left.clone());

            match self.run(&right_args).await {
                Ok(_) => {
                    info!(
                        "Dual displays {} | {} set to {} rotated {}",
                        left, right, mode, self.rotate
                    );
                    return Ok(());
                }
                Err(e) => debug!("{} rejected {}: {}", right, mode, e),
            }
        }

        // No shared mode: configure each output on its own
        warn!("No common mode for dual displays, configuring outputs separately");
        let left_ok = self.configure_single(std::slice::from_ref(left)).await.is_ok();
        let right_ok = self.configure_single(std::slice::from_ref(right)).await.is_ok();

        if left_ok || right_ok {
            Ok(())
        } else {
            Err(DisplayError::NoUsableMode {
                output: format!("{}, {}", left, right),
            })
        }
    }
}

#[async_trait]
impl DisplayPreparer for XrandrDisplay {
    async fn prepare(&self, mode: PlaybackMode) -> bool {
        let result = match self.connected_outputs().await {
            Ok(outputs) => match mode {
                PlaybackMode::Single => self.configure_single(&outputs).await,
                PlaybackMode::Dual => self.configure_dual(&outputs).await,
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Display preparation failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "xrandr"
    }
}
