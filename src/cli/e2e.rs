//! E2E command implementation

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{ArgAction, Args};

use super::{load_workspace, ServeCommand};
use crate::tasks::{E2eOptions, E2eTask};

/// Serve the app and run Protractor against it
#[derive(Args, Debug)]
pub struct E2eCommand {
    #[command(flatten)]
    pub serve: ServeCommand,

    /// Protractor config, relative to the project
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Update webdriver before running the tests
    #[arg(long = "webdriver-update", alias = "wu", default_value_t = true, action = ArgAction::Set)]
    pub webdriver_update: bool,

    /// Start Protractor's element explorer
    #[arg(long = "element-explorer", alias = "ee")]
    pub element_explorer: bool,

    /// Spec files to run, comma separated
    #[arg(long, value_delimiter = ',')]
    pub specs: Vec<String>,
}

impl E2eCommand {
    pub async fn execute(&self, project: &Path, verbose: bool) -> Result<i32> {
        let options = self.options(verbose)?;
        let task = E2eTask::new(load_workspace(project)?, options)?;
        Ok(task.run().await?)
    }

    pub fn options(&self, verbose: bool) -> Result<E2eOptions> {
        Ok(E2eOptions {
            serve: self.serve.options(verbose)?,
            config: self.config.clone(),
            webdriver_update: self.webdriver_update,
            element_explorer: self.element_explorer,
            specs: self.specs.clone(),
        })
    }
}
