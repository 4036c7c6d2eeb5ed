//! ngtasks library
//!
//! Build, serve, test and e2e tasks for an Angular workspace. The actual
//! bundling is done by an external driver process; this crate turns the
//! project config into the driver's configuration and orchestrates the
//! driver, Karma and Protractor.

pub mod bundler;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod tasks;
pub mod toolchain;
pub mod utils;

pub use cli::Cli;
pub use config::{AppConfig, BuildTarget, CliConfig};
pub use error::{Result, ToolError};
