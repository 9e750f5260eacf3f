use anyhow::{Context, Result};
use clap::Parser;
use motionplay::config::UnitConfig;
use motionplay::{MotionplayConfig, MotionplayOrchestrator, PlaybackMode};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "motionplay")]
#[command(about = "Motion-triggered video playback for one or two screens")]
#[command(version)]
#[command(long_about = "Shows the first frame of a clip paused on one or two screens, \
plays it through when a PIR, ultrasonic, serial or keyboard trigger confirms motion, then \
rotates to the next clip in the playlist. Intended to run unattended under systemd.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "motionplay.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Override the configured playback mode
    #[arg(short, long, value_name = "MODE", help = "Playback mode: single or dual")]
    mode: Option<PlaybackMode>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - prepare everything once, then release it
    #[arg(long, help = "Prepare displays, players and idle frame, then shut down")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily rotated files in this directory
    #[arg(long, value_name = "DIR", help = "Directory for daily rotated log files")]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Keep the guard alive so buffered file logs are flushed on exit
    let log_guard = init_logging(&args)?;

    info!("Starting motionplay v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match MotionplayConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e).context("loading configuration");
        }
    };

    if let Some(mode) = args.mode {
        info!("Playback mode overridden to {}", mode.as_str());
        config.playback.mode = mode;
    }

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut orchestrator = MotionplayOrchestrator::new(config).await.map_err(|e| {
        error!("Failed to create orchestrator: {}", e);
        e
    })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize system: {}", e);
        e
    })?;

    if args.dry_run {
        let exit_code = orchestrator.dry_run().await?;
        if exit_code == 0 {
            println!("✓ Dry run completed successfully");
        } else {
            eprintln!("✗ Dry run finished with errors");
        }
        drop(log_guard);
        std::process::exit(exit_code);
    }

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start system: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Motionplay exited with code: {}", exit_code);

    // Exit with appropriate code for systemd
    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("motionplay={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    // Plain-text file output next to the console, rotated daily
    let (file_layer, guard) = match args.log_file.as_deref() {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, "motionplay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let mut config = MotionplayConfig::default();
    config.playlist.units = vec![
        UnitConfig::Single {
            path: "/home/pi/videos/clip1.mp4".to_string(),
        },
        UnitConfig::Single {
            path: "/home/pi/videos/clip2.mp4".to_string(),
        },
    ];

    println!("# Motionplay Configuration File");
    println!("# Default configuration with all available options.");
    println!("# For dual mode set playback.mode = \"dual\" and give each unit");
    println!("# `left` and `right` paths instead of `path`.");
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("serializing default configuration")?
    );
    Ok(())
}
