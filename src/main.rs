//! ngtasks - build, serve and test tasks for the Tour of Heroes app
//!
//! # Tasks
//! - `build`: bundle the app, optionally watching for changes
//! - `serve`: development server with optional hot module replacement
//! - `test`: unit tests through Karma
//! - `e2e`: serve the app and run Protractor against it

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ngtasks::utils::logger;
use ngtasks::Cli;

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ngtasks=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ngtasks=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.execute().await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            logger::error(format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}
