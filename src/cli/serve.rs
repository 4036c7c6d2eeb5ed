//! Serve command implementation

use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{load_workspace, parse_target};
use crate::tasks::{ServeOptions, ServeTask, DEFAULT_PORT};

/// Build and serve the app, rebuilding on file changes
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// App name or index from the config
    #[arg(short, long)]
    pub app: Option<String>,

    /// Build target (development, production)
    #[arg(long)]
    pub target: Option<String>,

    /// Serve over HTTPS
    #[arg(long)]
    pub ssl: bool,

    /// Host to bind to
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Host the browser uses to reach the server
    #[arg(long = "public-host", alias = "publicHost")]
    pub public_host: Option<String>,

    /// Enable hot module replacement
    #[arg(long)]
    pub hmr: bool,

    /// Warn about circular imports
    #[arg(long)]
    pub circular: bool,

    /// Split node_modules code into a vendor chunk
    #[arg(long = "vendor-chunk")]
    pub vendor_chunk: bool,

    /// Do not open a browser after the first build
    #[arg(long = "no-open")]
    pub no_open: bool,
}

impl ServeCommand {
    pub async fn execute(&self, project: &Path, verbose: bool) -> Result<i32> {
        let options = self.options(verbose)?;
        let workspace = load_workspace(project)?;

        eprintln!("  {} Press {} to stop\n", "•".dimmed(), "Ctrl+C".yellow());

        let task = ServeTask::new(workspace, options);
        tokio::select! {
            result = task.run() => result?,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{} Shutting down dev server", "→".blue());
            }
        }

        Ok(0)
    }

    pub fn options(&self, verbose: bool) -> Result<ServeOptions> {
        let target = parse_target(self.target.as_deref())?;

        Ok(ServeOptions {
            app: self.app.clone(),
            target,
            verbose,
            ssl: self.ssl,
            host: self.host.clone(),
            port: self.port,
            public_host: self.public_host.clone(),
            hmr: false,
            circular: self.circular,
            vendor: self.vendor_chunk,
            open: !self.no_open,
        }
        .with_hmr(self.hmr))
    }
}
