//! # Glasswing
//!
//! Runs a compiled UI module in a desktop window.
//!
//! ## Usage
//!
//! ```bash
//! glasswing app.wasm
//! glasswing --config glasswing.toml
//! RUST_LOG=glasswing=debug,guest=info glasswing app.wasm
//! ```

use std::process::ExitCode;

use glasswing::{app, logging, ConfigError, HostConfig, HostError};
use tracing::error;

fn main() -> ExitCode {
    let config = match HostConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(ConfigError::Help) => {
            println!("{}", glasswing::config::USAGE);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = logging::init(&config.log.filter) {
        eprintln!("logging disabled: {err}");
    }

    match app::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "host stopped");
            report_fatal(&err);
            ExitCode::FAILURE
        }
    }
}

fn report_fatal(err: &HostError) {
    eprintln!("\n═══════════════════════════════════════════════════════════════");
    eprintln!("                    FATAL ERROR");
    eprintln!("═══════════════════════════════════════════════════════════════");
    eprintln!("{err}");
    eprintln!("═══════════════════════════════════════════════════════════════\n");
}
