//! Build command implementation

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{load_workspace, parse_target};
use crate::tasks::{BuildOptions, BuildTask};
use crate::utils::format_duration;

/// Build the app into its output directory
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// App name or index from the config
    #[arg(short, long)]
    pub app: Option<String>,

    /// Build target (development, production)
    #[arg(long)]
    pub target: Option<String>,

    /// Rebuild on file changes
    #[arg(short, long)]
    pub watch: bool,

    /// Write stats.json next to the bundles
    #[arg(long)]
    pub stats: bool,

    /// Warn about circular imports
    #[arg(long)]
    pub circular: bool,

    /// Split node_modules code into a vendor chunk
    #[arg(long = "vendor-chunk")]
    pub vendor_chunk: bool,
}

impl BuildCommand {
    pub async fn execute(&self, project: &Path, verbose: bool) -> Result<i32> {
        let start = Instant::now();
        let options = self.options(verbose)?;
        let watch = options.watch;

        BuildTask::new(load_workspace(project)?, options).run().await?;

        if !watch {
            eprintln!(
                "\n{} Built in {}\n",
                "✓".green().bold(),
                format_duration(start.elapsed())
            );
        }

        Ok(0)
    }

    pub fn options(&self, verbose: bool) -> Result<BuildOptions> {
        Ok(BuildOptions {
            app: self.app.clone(),
            target: parse_target(self.target.as_deref())?,
            verbose,
            watch: self.watch,
            stats: self.stats,
            circular: self.circular,
            vendor: self.vendor_chunk,
        })
    }
}
