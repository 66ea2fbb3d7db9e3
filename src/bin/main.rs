use std::{
    error::Error,
    fs, io, process,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use svcwatch::{
    cli::{Cli, parse_args},
    config::{FileConfig, MonitorSettings, load_config, load_services},
    diagnostics::Diagnostics,
    error::MonitorError,
    monitor::Monitor,
    probe::SystemctlProber,
    shutdown::CANCELLED_EXIT_CODE,
};

/// Exit code for failures before or during a `--once` cycle.
const FAILURE_EXIT_CODE: i32 = 1;

fn main() {
    let args = parse_args();
    init_logging(&args);

    if let Err(err) = run(&args) {
        error!("{err}");
        process::exit(FAILURE_EXIT_CODE);
    }
}

fn run(args: &Cli) -> Result<(), Box<dyn Error>> {
    let settings = resolve_settings(args)?;
    let services = load_services(&settings.services_file)?;
    fs::create_dir_all(settings.layout.logs_dir())?;

    let prober = SystemctlProber::new(&settings.systemctl, settings.user_mode);
    info!(
        "Monitoring {} services from {:?} as '{}' every {:?}",
        services.len(),
        settings.services_file,
        prober.account(),
        settings.interval
    );

    let mut monitor = Monitor::new(settings, services, prober, Diagnostics::stdout());

    if args.once {
        monitor.run_cycle(&AtomicBool::new(false))?;
        return Ok(());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    register_signal_handler(Arc::clone(&cancel))?;
    monitor.run(&cancel);

    if let Err(err) = monitor.shutdown() {
        error!("Failed to persist final snapshot: {err}");
    }
    process::exit(CANCELLED_EXIT_CODE);
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // stdout carries the diagnostic event stream.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn resolve_settings(args: &Cli) -> Result<MonitorSettings, Box<dyn Error>> {
    let file_config = match args.config.as_deref() {
        Some(path) => load_config(Path::new(path))?,
        None => FileConfig::default(),
    };

    Ok(MonitorSettings::try_from(args.overrides().or(file_config))?)
}

fn register_signal_handler(cancel: Arc<AtomicBool>) -> Result<(), MonitorError> {
    ctrlc::set_handler(move || {
        info!("svcwatch is shutting down...");
        cancel.store(true, Ordering::SeqCst);
    })?;

    Ok(())
}
