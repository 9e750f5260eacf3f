use crate::error::SensorError;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Attempts made while waiting for a freshly exported pin to show up
const EXPORT_POLL_ATTEMPTS: u32 = 20;
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// A GPIO line driven through the sysfs interface (`/sys/class/gpio`)
#[derive(Debug)]
pub struct SysfsPin {
    root: PathBuf,
    pin: u32,
    exported_here: bool,
    value: File,
}

impl SysfsPin {
    /// Export the pin if needed, set its direction and open its value file
    pub fn open<P: AsRef<Path>>(root: P, pin: u32, direction: Direction) -> Result<Self, SensorError> {
        let root = root.as_ref().to_path_buf();
        let pin_dir = root.join(format!("gpio{}", pin));
        let mut exported_here = false;

        if !pin_dir.exists() {
            debug!("Exporting GPIO {}", pin);
            fs::write(root.join("export"), pin.to_string()).map_err(|e| SensorError::Gpio {
                pin,
                details: format!("export failed: {}", e),
            })?;
            exported_here = true;

            // udev may need a moment to create the node and fix permissions
            let mut attempts = 0;
            while !pin_dir.join("direction").exists() {
                attempts += 1;
                if attempts >= EXPORT_POLL_ATTEMPTS {
                    return Err(SensorError::Gpio {
                        pin,
                        details: "pin did not appear after export".to_string(),
                    });
                }
                std::thread::sleep(EXPORT_POLL_INTERVAL);
            }
        }

        fs::write(pin_dir.join("direction"), direction.as_str()).map_err(|e| SensorError::Gpio {
            pin,
            details: format!("setting direction {} failed: {}", direction.as_str(), e),
        })?;

        let value = OpenOptions::new()
            .read(true)
            .write(direction == Direction::Out)
            .open(pin_dir.join("value"))
            .map_err(|e| SensorError::Gpio {
                pin,
                details: format!("opening value failed: {}", e),
            })?;

        debug!("GPIO {} ready as {}", pin, direction.as_str());

        Ok(Self {
            root,
            pin,
            exported_here,
            value,
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn read_level(&mut self) -> Result<bool, SensorError> {
        let mut buf = [0u8; 4];
        self.value
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.value.read(&mut buf))
            .map_err(|e| SensorError::Gpio {
                pin: self.pin,
                details: format!("read failed: {}", e),
            })
            .and_then(|n| match buf[..n].first() {
                Some(b'1') => Ok(true),
                Some(b'0') => Ok(false),
                _ => Err(SensorError::Read {
                    details: format!(
                        "GPIO {} value {:?} is not a level",
                        self.pin,
                        String::from_utf8_lossy(&buf[..n])
                    ),
                }),
            })
    }

    pub fn write_level(&mut self, high: bool) -> Result<(), SensorError> {
        let level: &[u8] = if high { b"1" } else { b"0" };
        self.value
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.value.write_all(level))
            .map_err(|e| SensorError::Gpio {
                pin: self.pin,
                details: format!("write failed: {}", e),
            })
    }

    /// Hand the pin back to the kernel if this process exported it
    pub fn release(self) {
        if self.exported_here {
            if let Err(e) = fs::write(self.root.join("unexport"), self.pin.to_string()) {
                warn!("Failed to unexport GPIO {}: {}", self.pin, e);
            }
        }
    }
}
