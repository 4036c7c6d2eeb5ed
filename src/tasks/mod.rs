//! Task orchestrators
//!
//! Each task is built from its options (nothing runs yet) and consumed by
//! `run`, so a task value can run at most once.

mod build;
mod e2e;
mod serve;
mod test;

use std::path::{Path, PathBuf};

use crate::config::{AppConfig, CliConfig};
use crate::driver::{CompileStats, ProcessDriver};
use crate::error::Result;
use crate::toolchain::Toolchain;
use crate::utils::{self, logger};

pub use build::{BuildOptions, BuildTask};
pub use e2e::{base_url, E2eOptions, E2eTask, RebuildGate};
pub use serve::{ServeOptions, ServeSession, ServeTask, DEFAULT_PORT};
pub use test::{KarmaBuildOverrides, KarmaLogLevel, KarmaOverrides, TestOptions, TestTask, DEFAULT_KARMA_PORT};

/// The project a task runs against
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: CliConfig,
    toolchain: Toolchain,
}

impl Workspace {
    /// Read the project config from `root`; the root is kept absolute
    pub fn discover(root: &Path) -> Result<Self> {
        let root = utils::absolute_path(root)?;
        let config = CliConfig::discover(&root)?;
        let toolchain = Toolchain::new(&root, &config.tooling);

        Ok(Self {
            root,
            config,
            toolchain,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn app(&self, name_or_index: Option<&str>) -> Result<&AppConfig> {
        self.config.app(name_or_index)
    }

    /// Driver process for this project's bundler
    pub fn driver(&self) -> ProcessDriver {
        ProcessDriver::new(self.toolchain.bundler(), self.root.clone())
    }

    /// Wipe and recreate an output directory below the project root
    pub fn clear_output(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let target = utils::resolve_path(&self.root, dir.as_ref());
        logger::warn(format!("Clearing output directory {}", target.display()));
        utils::clear_output_dir(&self.root, dir.as_ref())
    }
}

/// Print a compilation summary, then warnings and errors
pub(crate) fn report_stats(stats: &CompileStats, verbose: bool) {
    logger::info(stats.summary(verbose));

    if stats.has_warnings() {
        logger::warn(stats.warnings_to_string());
    }
    if stats.has_errors() {
        logger::error(stats.errors_to_string());
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use crate::bundler::BundlerConfiguration;
    use crate::driver::{BundlerDriver, CompileStats, DriverMode, RebuildStream};
    use crate::error::Result;

    pub const CONFIG: &str = r#"{
        "apps": [
            { "name": "tour-of-heroes", "root": "src", "outDir": "dist", "main": "main.ts", "styles": ["styles.css"] },
            { "name": "no-main", "root": "lib", "outDir": "dist-lib" }
        ],
        "test": { "karma": { "config": "karma.conf.js" } },
        "e2e": { "protractor": { "config": "protractor.conf.js" } }
    }"#;

    pub fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".angular-cli.json"), CONFIG).unwrap();
        dir
    }

    /// Driver that replays canned results and records what it was given
    #[derive(Default)]
    pub struct FakeDriver {
        pub results: Mutex<Vec<CompileStats>>,
        pub seen: Arc<Mutex<Vec<BundlerConfiguration>>>,
        pub modes: Mutex<Vec<DriverMode>>,
    }

    impl FakeDriver {
        pub fn with_results(results: Vec<CompileStats>) -> Self {
            Self {
                results: Mutex::new(results),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BundlerDriver for FakeDriver {
        async fn run(&self, config: &BundlerConfiguration) -> Result<CompileStats> {
            self.seen.lock().unwrap().push(config.clone());
            self.modes.lock().unwrap().push(DriverMode::Run);
            Ok(self.results.lock().unwrap().remove(0))
        }

        async fn watch(&self, config: &BundlerConfiguration, mode: DriverMode) -> Result<RebuildStream> {
            self.seen.lock().unwrap().push(config.clone());
            self.modes.lock().unwrap().push(mode);

            let results: Vec<CompileStats> = self.results.lock().unwrap().drain(..).collect();
            let (tx, rx) = mpsc::channel(results.len().max(1));
            for stats in results {
                tx.send(stats).await.unwrap();
            }
            Ok(RebuildStream::new(rx))
        }
    }
}
