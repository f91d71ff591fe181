use anyhow::Result;
use autoshutdown::{
    logging, AutoshutdownConfig, CommandShutdownFacility, DryRunShutdownFacility, PollLoop,
    ShutdownFacility,
};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "autoshutdown")]
#[command(about = "Shuts the host down after a period without user activity")]
#[command(version)]
#[command(long_about = "An idle-detection daemon that polls login sessions, file-sharing \
connections, a media server and a download client. When none of them reports activity it \
schedules a delayed shutdown, and cancels it again as soon as activity resumes.")]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "autoshutdown.toml",
        help = "Path to TOML configuration file"
    )]
    config: String,

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
    #[arg(long, help = "Validate configuration file and exit without polling")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Log shutdown commands instead of running them
    #[arg(long, help = "Poll as usual but only log the shutdown commands that would run")]
    dry_run: bool,

    /// Run a single tick and exit
    #[arg(long, help = "Run exactly one polling tick without the initial sleep, then exit")]
    once: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let mut config = match AutoshutdownConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Failed to load configuration from {}: {}", args.config, e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    apply_log_overrides(&mut config, &args);
    let _log_guard = logging::init_logging(&config.logging, args.debug)?;

    info!("Starting autoshutdown v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e.into());
    }

    let facility: Box<dyn ShutdownFacility> = if args.dry_run {
        info!("Dry run mode - shutdown commands will only be logged");
        Box::new(DryRunShutdownFacility::new(config.shutdown.clone()))
    } else {
        Box::new(CommandShutdownFacility::new(config.shutdown.clone()))
    };

    let mut poll_loop = PollLoop::from_config(&config, facility).map_err(|e| {
        error!("Failed to set up the poll loop: {}", e);
        e
    })?;

    if args.once {
        let state = poll_loop.run_once().await?;
        println!("Shutdown state after one tick: {}", state);
        return Ok(());
    }

    let reason = poll_loop.run().await.map_err(|e| {
        error!("Poll loop error: {}", e);
        e
    })?;

    info!("Autoshutdown exited: {:?}", reason);
    Ok(())
}

/// Command-line flags win over the configured level and format
fn apply_log_overrides(config: &mut AutoshutdownConfig, args: &Args) {
    let level = if args.debug {
        Some("debug")
    } else if args.verbose {
        Some("info")
    } else if args.quiet {
        Some("error")
    } else {
        None
    };

    if let Some(level) = level {
        config.logging.level = level.to_string();
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Autoshutdown Configuration File");
    println!("# This is the default configuration with all available options.");
    println!("# Environment variables override it, e.g. AUTOSHUTDOWN_POLL__INTERVAL_SECONDS=30");
    println!();
    println!("{}", AutoshutdownConfig::default().to_toml()?);
    Ok(())
}
