//! Configuration handling
//!
//! Finds and parses the project's `.angular-cli.json` and selects the app a
//! task should work on.

mod schema;
mod target;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ToolError};

pub use schema::*;
pub use target::BuildTarget;

/// Config file names tried in order
pub const CONFIG_FILE_NAMES: [&str; 2] = [".angular-cli.json", "angular-cli.json"];

/// The whole project configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Buildable apps, in declaration order
    #[serde(default)]
    pub apps: Vec<AppConfig>,

    #[serde(default)]
    pub test: TestSection,

    #[serde(default)]
    pub e2e: E2eSection,

    #[serde(default)]
    pub tooling: ToolingConfig,

    /// Directory the config file was found in
    #[serde(skip)]
    pub root: PathBuf,
}

impl CliConfig {
    /// Locate and parse the config file in `root`
    pub fn discover(root: &Path) -> Result<Self> {
        let searched: Vec<PathBuf> = CONFIG_FILE_NAMES.iter().map(|name| root.join(name)).collect();

        let path = searched
            .iter()
            .find(|path| path.is_file())
            .ok_or_else(|| ToolError::ConfigNotFound {
                searched: searched.clone(),
            })?;

        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;

        let mut config: CliConfig =
            serde_json::from_str(&content).map_err(|source| ToolError::ConfigParse {
                path: path.clone(),
                source,
            })?;
        config.root = root.to_path_buf();

        Ok(config)
    }

    /// Select an app by name or index.
    ///
    /// No selector picks the first app. A selector made only of digits is an
    /// index; anything else must equal an app name exactly.
    pub fn app(&self, name_or_index: Option<&str>) -> Result<&AppConfig> {
        let not_found = || ToolError::AppNotFound {
            selector: name_or_index.unwrap_or("0").to_string(),
        };

        match name_or_index {
            None | Some("") => self.apps.first().ok_or_else(not_found),
            Some(selector) if selector.bytes().all(|b| b.is_ascii_digit()) => selector
                .parse::<usize>()
                .ok()
                .and_then(|index| self.apps.get(index))
                .ok_or_else(not_found),
            Some(selector) => self
                .apps
                .iter()
                .find(|app| app.name == selector)
                .ok_or_else(not_found),
        }
    }

    /// Karma config path, resolved against the project root
    pub fn karma_config(&self) -> Result<PathBuf> {
        self.test
            .karma
            .config
            .as_ref()
            .map(|path| self.root.join(path))
            .ok_or(ToolError::MissingToolConfig { tool: "karma" })
    }

    /// Protractor config path, resolved against the project root
    pub fn protractor_config(&self) -> Result<PathBuf> {
        self.e2e
            .protractor
            .config
            .as_ref()
            .map(|path| self.root.join(path))
            .ok_or(ToolError::MissingToolConfig { tool: "protractor" })
    }
}

/// Discover the config in `root` and return the selected app
pub fn load_app(root: &Path, name_or_index: Option<&str>) -> Result<AppConfig> {
    CliConfig::discover(root)?.app(name_or_index).cloned()
}
