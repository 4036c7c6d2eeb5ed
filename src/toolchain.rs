//! Locating the external tools
//!
//! Commands come from the `tooling` section of the project config, falling
//! back to the binaries npm installs under `node_modules/.bin`.

use std::env;
use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::config::ToolingConfig;
use crate::error::{Result, ToolError};

/// Overrides the bundler driver command, whitespace separated
pub const BUNDLER_ENV: &str = "NGTASKS_BUNDLER";

const BUNDLER_DRIVER_BIN: &str = "ngtasks-bundler-driver";

#[derive(Debug, Clone)]
pub struct Toolchain {
    root: PathBuf,
    tooling: ToolingConfig,
}

impl Toolchain {
    pub fn new(root: &Path, tooling: &ToolingConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            tooling: tooling.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bundler(&self) -> Vec<String> {
        if let Ok(value) = env::var(BUNDLER_ENV) {
            let parts: Vec<String> = value.split_whitespace().map(str::to_string).collect();
            if !parts.is_empty() {
                return parts;
            }
        }

        self.tooling
            .bundler
            .clone()
            .unwrap_or_else(|| vec![self.bin(BUNDLER_DRIVER_BIN)])
    }

    pub fn karma(&self) -> Vec<String> {
        self.tooling.karma.clone().unwrap_or_else(|| vec![self.bin("karma")])
    }

    pub fn protractor(&self) -> Vec<String> {
        self.tooling
            .protractor
            .clone()
            .unwrap_or_else(|| vec![self.bin("protractor")])
    }

    /// webdriver-manager ships inside protractor with npm and at the top
    /// level with yarn
    pub fn webdriver_manager(&self) -> Result<Vec<String>> {
        if let Some(command) = &self.tooling.webdriver_manager {
            return Ok(command.clone());
        }

        let candidates = [
            self.root.join("node_modules/protractor/node_modules/.bin/webdriver-manager"),
            self.root.join("node_modules/.bin/webdriver-manager"),
        ];

        candidates
            .iter()
            .find(|path| path.is_file())
            .map(|path| vec![path.to_string_lossy().into_owned()])
            .ok_or_else(|| {
                ToolError::external(
                    "webdriver-manager",
                    "Cannot automatically find webdriver-manager to update. \
                     Please update webdriver-manager manually instead.",
                )
            })
    }

    fn bin(&self, name: &str) -> String {
        self.root
            .join("node_modules/.bin")
            .join(name)
            .to_string_lossy()
            .into_owned()
    }
}

/// Build a command from `program args...`, run from `cwd`
pub fn command(tool: &str, parts: &[String], cwd: &Path) -> Result<Command> {
    let (program, args) = parts
        .split_first()
        .ok_or_else(|| ToolError::external(tool, "no command configured"))?;

    let mut command = Command::new(program);
    command.args(args).current_dir(cwd);
    Ok(command)
}
