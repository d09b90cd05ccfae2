mod app;
mod config;
mod logging;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Parser;
use engine_logging::engine_error;

use crate::config::AppConfig;
use crate::logging::LogDestination;

/// Builds e-reader editions of The Economist.
#[derive(Debug, Parser)]
#[command(name = "press", version)]
struct Args {
    /// Issue dates as YYYY-MM-DD; the current issue when none is given.
    #[arg(value_parser = parse_date)]
    dates: Vec<NaiveDate>,

    /// Configuration file (RON).
    #[arg(long, default_value = "press.ron")]
    config: PathBuf,

    /// Where log output goes.
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    log: LogDestination,

    /// Log debug details.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    if value.len() != 10 {
        return Err(format!("'{value}' is not a YYYY-MM-DD date"));
    }
    press_core::parse_issue_date(value).ok_or_else(|| format!("'{value}' is not a valid date"))
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::initialize(args.log, args.verbose);

    let result = AppConfig::load(&args.config).and_then(|config| app::run(config, &args.dates));
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            engine_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
