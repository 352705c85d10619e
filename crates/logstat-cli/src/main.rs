use anyhow::Result;
use clap::Parser;
use logstat_cli::commands::run::{self, RunOutcome};
use logstat_core::config::ConfigOverrides;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

#[derive(Parser)]
#[command(name = "logstat")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Build an HTML report of per-URL request times from the latest nginx access log",
    long_about = "logstat finds the newest nginx-access-ui.log-YYYYMMDD.(log|gz) file in LOG_DIR, \
                  aggregates request times per URL and writes REPORT_DIR/report-YYYY.MM.DD.html. \
                  A run is a no-op when that report already exists."
)]
struct Cli {
    /// Config file with a [log_analyzer] section overriding the defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The config file may redirect logging, so read it before the subscriber
    // exists and report any problem once logging is up.
    let (overrides, config_error) = match cli.config.as_deref().map(ConfigOverrides::from_file) {
        None => (ConfigOverrides::new(), None),
        Some(Ok(overrides)) => (overrides, None),
        Some(Err(e)) => (ConfigOverrides::new(), Some(e)),
    };

    if let Err(e) = init_logging(overrides.output().as_deref()) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    if let Some(e) = config_error {
        tracing::warn!("{}; using default configuration", e);
    }

    match run::execute(&overrides) {
        Ok(RunOutcome::Written(path)) => {
            tracing::info!("Report ready: {}", path.display());
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Skipped(path)) => {
            tracing::info!("Report up to date: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(output: Option<&Path>) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("logstat=info,logstat_cli=info,logstat_core=info"));

    match output {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}
