//! Test task: unit tests through Karma

use std::fmt;
use std::path::Path;
use std::process::ExitStatus;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};
use tracing::debug;

use super::Workspace;
use crate::error::{Result, ToolError};
use crate::toolchain;
use crate::utils::logger;

/// Karma's own default port
pub const DEFAULT_KARMA_PORT: u16 = 9876;

/// Environment variable carrying [`KarmaOverrides`] as JSON for the karma plugin
pub const OVERRIDES_ENV: &str = "NGTASKS_KARMA_OVERRIDES";

const COVERAGE_DIR: &str = "coverage";
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KarmaLogLevel {
    Disable,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Log,
}

impl KarmaLogLevel {
    /// Case-insensitive; anything unknown falls back to `warn`
    pub fn normalize(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KarmaLogLevel::Disable => "disable",
            KarmaLogLevel::Error => "error",
            KarmaLogLevel::Warn => "warn",
            KarmaLogLevel::Info => "info",
            KarmaLogLevel::Debug => "debug",
            KarmaLogLevel::Log => "log",
        }
    }
}

impl FromStr for KarmaLogLevel {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(KarmaLogLevel::Disable),
            "error" => Ok(KarmaLogLevel::Error),
            "warn" => Ok(KarmaLogLevel::Warn),
            "info" => Ok(KarmaLogLevel::Info),
            "debug" => Ok(KarmaLogLevel::Debug),
            "log" => Ok(KarmaLogLevel::Log),
            _ => Err(()),
        }
    }
}

impl fmt::Display for KarmaLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOptions {
    pub app: Option<String>,
    /// Keep Karma running and re-test on changes
    pub watch: bool,
    pub log_level: KarmaLogLevel,
    pub port: u16,
    pub progress: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            app: None,
            watch: false,
            log_level: KarmaLogLevel::Warn,
            port: DEFAULT_KARMA_PORT,
            progress: true,
        }
    }
}

/// Settings forced onto the karma config
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KarmaOverrides {
    pub port: u16,
    pub single_run: bool,
    pub log_level: KarmaLogLevel,
    pub angular_cli: KarmaBuildOverrides,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KarmaBuildOverrides {
    pub code_coverage: bool,
    pub sourcemaps: bool,
    pub progress: bool,
    pub preserve_symlinks: bool,
    pub force_ts_commonjs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
}

impl KarmaOverrides {
    pub fn from_options(options: &TestOptions) -> Self {
        Self {
            port: options.port,
            single_run: !options.watch,
            log_level: options.log_level,
            angular_cli: KarmaBuildOverrides {
                code_coverage: true,
                sourcemaps: true,
                progress: options.progress,
                preserve_symlinks: true,
                force_ts_commonjs: false,
                app: options.app.clone(),
            },
        }
    }
}

pub struct TestTask {
    workspace: Workspace,
    options: TestOptions,
}

impl TestTask {
    pub fn new(workspace: Workspace, options: TestOptions) -> Self {
        Self { workspace, options }
    }

    pub fn options(&self) -> &TestOptions {
        &self.options
    }

    /// Run Karma and return its exit code
    pub async fn run(self) -> Result<i32> {
        let app = self.workspace.app(self.options.app.as_deref())?;
        if app.main.is_none() {
            return Err(ToolError::MissingEntryPoint {
                app: app.display_name().to_string(),
            });
        }

        let karma_config = self.workspace.config().karma_config()?;
        self.workspace.clear_output(COVERAGE_DIR)?;

        logger::info("Preparing to execute tests with Karma...");
        logger::info(format!("Log level set to '{}'.", self.options.log_level));

        let mut child = self
            .karma_start(&karma_config)?
            .spawn()
            .map_err(|e| ToolError::external("karma", format!("failed to start: {}", e)))?;

        let exited = tokio::select! {
            status = child.wait() => Some(status?),
            _ = tokio::signal::ctrl_c() => None,
        };

        let status = match exited {
            Some(status) => status,
            None => {
                logger::warn("Terminating Karma...");
                self.stop(&karma_config, &mut child).await?
            }
        };

        let code = status.code().unwrap_or(1);
        if code > 0 {
            logger::error(format!("Karma has exited with {}.", code));
        } else {
            logger::info(format!("Karma has exited with {}.", code));
        }

        Ok(code)
    }

    fn karma_start(&self, karma_config: &Path) -> Result<Command> {
        let overrides = serde_json::to_string(&KarmaOverrides::from_options(&self.options))
            .map_err(|e| ToolError::external("karma", format!("failed to encode overrides: {}", e)))?;

        let mut command = toolchain::command("karma", &self.workspace.toolchain().karma(), self.workspace.root())?;
        command
            .arg("start")
            .arg(karma_config)
            .arg("--port")
            .arg(self.options.port.to_string())
            .arg(if self.options.watch {
                "--no-single-run"
            } else {
                "--single-run"
            })
            .arg("--log-level")
            .arg(self.options.log_level.as_str())
            .env(OVERRIDES_ENV, overrides)
            .kill_on_drop(true);

        Ok(command)
    }

    async fn stop(&self, karma_config: &Path, child: &mut Child) -> Result<ExitStatus> {
        let stopped = toolchain::command("karma", &self.workspace.toolchain().karma(), self.workspace.root())?
            .arg("stop")
            .arg(karma_config)
            .arg("--port")
            .arg(self.options.port.to_string())
            .status()
            .await;

        if let Err(e) = stopped {
            debug!("karma stop failed: {}", e);
        }

        match tokio::time::timeout(STOP_TIMEOUT, child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                child.kill().await?;
                Ok(child.wait().await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::project;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_log_level_normalization() {
        assert_eq!(KarmaLogLevel::normalize(Some("DEBUG")), KarmaLogLevel::Debug);
        assert_eq!(KarmaLogLevel::normalize(Some("Disable")), KarmaLogLevel::Disable);
        assert_eq!(KarmaLogLevel::normalize(Some("verbose")), KarmaLogLevel::Warn);
        assert_eq!(KarmaLogLevel::normalize(None), KarmaLogLevel::Warn);
    }

    #[test]
    fn test_overrides_json() {
        let options = TestOptions {
            app: Some("tour-of-heroes".to_string()),
            watch: true,
            log_level: KarmaLogLevel::Info,
            port: 9877,
            progress: false,
        };
        let json = serde_json::to_value(KarmaOverrides::from_options(&options)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "port": 9877,
                "singleRun": false,
                "logLevel": "info",
                "angularCli": {
                    "codeCoverage": true,
                    "sourcemaps": true,
                    "progress": false,
                    "preserveSymlinks": true,
                    "forceTsCommonjs": false,
                    "app": "tour-of-heroes"
                }
            })
        );
    }

    #[tokio::test]
    async fn test_app_without_main_is_rejected() {
        let root = project();
        let options = TestOptions {
            app: Some("no-main".to_string()),
            ..TestOptions::default()
        };
        let task = TestTask::new(Workspace::discover(root.path()).unwrap(), options);
        assert_eq!(task.options().port, DEFAULT_KARMA_PORT);

        let err = task.run().await.unwrap_err();

        assert!(matches!(err, ToolError::MissingEntryPoint { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_karma_exit_code_is_returned() {
        let root = project();
        let coverage = root.path().join("coverage");
        fs::create_dir_all(&coverage).unwrap();
        fs::write(coverage.join("lcov.info"), "").unwrap();

        let script = root.path().join("karma.sh");
        fs::write(
            &script,
            "[ \"$1\" = start ] || exit 9\n\
             echo \"$NGTASKS_KARMA_OVERRIDES\" | grep -q '\"singleRun\":true' || exit 8\n\
             exit 3\n",
        )
        .unwrap();

        let config = crate::tasks::testing::CONFIG.replacen(
            "\"apps\"",
            &format!(
                "\"tooling\": {{ \"karma\": [\"sh\", \"{}\"] }}, \"apps\"",
                script.display()
            ),
            1,
        );
        fs::write(root.path().join(".angular-cli.json"), config).unwrap();

        let code = TestTask::new(Workspace::discover(root.path()).unwrap(), TestOptions::default())
            .run()
            .await
            .unwrap();

        assert_eq!(code, 3);
        assert!(coverage.is_dir());
        assert!(!coverage.join("lcov.info").exists());
    }
}
