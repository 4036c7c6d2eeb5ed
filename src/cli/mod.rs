//! Command-line interface for ngtasks
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: Bundle the app into its output directory
//! - `serve`: Development server
//! - `test`: Unit tests through Karma
//! - `e2e`: Serve the app and run Protractor against it

mod build;
mod e2e;
mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::config::BuildTarget;
use crate::tasks::Workspace;

pub use build::BuildCommand;
pub use e2e::E2eCommand;
pub use serve::ServeCommand;
pub use test::TestCommand;

/// ngtasks - build, serve and test the Tour of Heroes app
#[derive(Parser, Debug)]
#[command(name = "ngtasks")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory containing .angular-cli.json
    #[arg(long, global = true, default_value = ".")]
    pub project: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the app into its output directory
    Build(BuildCommand),

    /// Build and serve the app, rebuilding on file changes
    Serve(ServeCommand),

    /// Run unit tests
    Test(TestCommand),

    /// Run end-to-end tests against a served app
    E2e(E2eCommand),
}

impl Cli {
    /// Execute the CLI command and return the process exit code
    pub async fn execute(&self) -> Result<i32> {
        print_banner();

        let project = self.project.as_path();
        match &self.command {
            Commands::Build(cmd) => cmd.execute(project, self.verbose).await,
            Commands::Serve(cmd) => cmd.execute(project, self.verbose).await,
            Commands::Test(cmd) => cmd.execute(project).await,
            Commands::E2e(cmd) => cmd.execute(project, self.verbose).await,
        }
    }
}

/// Read the project config; commands call this after their flags are validated
pub(crate) fn load_workspace(project: &Path) -> Result<Workspace> {
    Workspace::discover(project).with_context(|| format!("Failed to load project at {}", project.display()))
}

/// `--target` is validated before any work starts
pub(crate) fn parse_target(target: Option<&str>) -> Result<BuildTarget> {
    Ok(BuildTarget::ensure(target)?)
}

/// Print the ngtasks banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "ngtasks".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
