//! External bundler driver
//!
//! The driver is a separate process that owns the actual bundler and dev
//! server. It receives a [`BundlerConfiguration`] as JSON on stdin and
//! answers with one JSON event per stdout line.

mod stats;

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::mpsc;
use tracing::debug;

use crate::bundler::BundlerConfiguration;
use crate::error::{Result, ToolError};
use crate::toolchain;
use crate::utils::logger;
use crate::utils::progress::ProgressReporter;

pub use stats::{AssetStats, CompileStats};

const TOOL: &str = "bundler";

/// How the driver should treat the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMode {
    /// Compile once and exit
    Run,
    /// Recompile on file changes
    Watch,
    /// Watch and serve through the dev server
    Serve,
}

impl DriverMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverMode::Run => "run",
            DriverMode::Watch => "watch",
            DriverMode::Serve => "serve",
        }
    }
}

/// One line of driver output
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DriverEvent {
    Progress {
        percent: f64,
        #[serde(default)]
        message: String,
    },
    Done(CompileStats),
    Failed {
        message: String,
    },
}

impl DriverEvent {
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }
}

/// The seam between tasks and whatever runs the bundler
#[async_trait]
pub trait BundlerDriver: Send + Sync {
    /// Compile once
    async fn run(&self, config: &BundlerConfiguration) -> Result<CompileStats>;

    /// Start a long-running compilation; every rebuild arrives on the stream
    async fn watch(&self, config: &BundlerConfiguration, mode: DriverMode) -> Result<RebuildStream>;
}

/// Rebuild results from a watching driver.
///
/// Dropping or cancelling the stream stops the driver process.
pub struct RebuildStream {
    events: mpsc::Receiver<CompileStats>,
    process: Option<Child>,
}

impl RebuildStream {
    /// Stream fed by an in-process sender
    pub fn new(events: mpsc::Receiver<CompileStats>) -> Self {
        Self { events, process: None }
    }

    fn with_process(events: mpsc::Receiver<CompileStats>, process: Child) -> Self {
        Self {
            events,
            process: Some(process),
        }
    }

    /// Next rebuild, `None` once the driver is gone
    pub async fn next(&mut self) -> Option<CompileStats> {
        self.events.recv().await
    }

    /// Stop listening and terminate the driver
    pub async fn cancel(mut self) {
        self.events.close();
        if let Some(mut child) = self.process.take() {
            if let Err(e) = child.kill().await {
                debug!("Failed to stop {}: {}", TOOL, e);
            }
        }
    }

    /// Wait for the driver to exit on its own
    pub async fn wait(mut self) -> Result<Option<ExitStatus>> {
        match self.process.take() {
            Some(mut child) => Ok(Some(child.wait().await?)),
            None => Ok(None),
        }
    }
}

/// Driver reached through a child process
pub struct ProcessDriver {
    command: Vec<String>,
    cwd: PathBuf,
}

impl ProcessDriver {
    pub fn new(command: Vec<String>, cwd: PathBuf) -> Self {
        Self { command, cwd }
    }

    async fn spawn(&self, config: &BundlerConfiguration, mode: DriverMode) -> Result<(Child, ChildStdout)> {
        debug!("Spawning {:?} {}", self.command, mode.as_str());

        let mut child = toolchain::command(TOOL, &self.command, &self.cwd)?
            .arg(mode.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::external(TOOL, format!("failed to start {:?}: {}", self.command, e)))?;

        let payload = serde_json::to_vec(config)
            .map_err(|e| ToolError::external(TOOL, format!("failed to encode configuration: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::external(TOOL, "driver stdout is not captured"))?;

        Ok((child, stdout))
    }
}

#[async_trait]
impl BundlerDriver for ProcessDriver {
    async fn run(&self, config: &BundlerConfiguration) -> Result<CompileStats> {
        let (mut child, stdout) = self.spawn(config, DriverMode::Run).await?;
        let mut progress = ProgressReporter::new();
        let mut lines = BufReader::new(stdout).lines();
        let mut result = None;
        let mut failure = None;

        while let Some(line) = lines.next_line().await? {
            match DriverEvent::parse(&line) {
                Some(DriverEvent::Progress { percent, message }) => progress.update(percent, &message),
                Some(DriverEvent::Done(stats)) => {
                    progress.clear();
                    result = Some(stats);
                }
                Some(DriverEvent::Failed { message }) => {
                    progress.clear();
                    failure = Some(message);
                }
                None => logger::info(line),
            }
        }

        let status = child.wait().await?;
        debug!("{} exited with {}", TOOL, status);

        match (result, failure) {
            (Some(stats), _) => Ok(stats),
            (None, Some(message)) => Err(ToolError::external(TOOL, message)),
            (None, None) => Err(ToolError::external(
                TOOL,
                format!("exited with {} without reporting a compilation", status),
            )),
        }
    }

    async fn watch(&self, config: &BundlerConfiguration, mode: DriverMode) -> Result<RebuildStream> {
        let (child, stdout) = self.spawn(config, mode).await?;
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let mut progress = ProgressReporter::new();
            let mut lines = BufReader::new(stdout).lines();

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        logger::error(format!("Lost connection to {}: {}", TOOL, e));
                        break;
                    }
                };

                match DriverEvent::parse(&line) {
                    Some(DriverEvent::Progress { percent, message }) => progress.update(percent, &message),
                    Some(DriverEvent::Done(stats)) => {
                        progress.clear();
                        if tx.send(stats).await.is_err() {
                            break;
                        }
                    }
                    Some(DriverEvent::Failed { message }) => {
                        progress.clear();
                        logger::error(message);
                    }
                    None => logger::info(line),
                }
            }
        });

        Ok(RebuildStream::with_process(rx, child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{AppBundleConfig, ConfigBuildOptions};
    use crate::config::{AppConfig, BuildTarget};
    use tempfile::TempDir;

    fn config(root: &std::path::Path) -> BundlerConfiguration {
        let app: AppConfig = serde_json::from_str(r#"{ "name": "toh", "main": "main.ts" }"#).unwrap();
        AppBundleConfig::new(&app, root)
            .build(&ConfigBuildOptions::new(BuildTarget::Development))
            .unwrap()
    }

    #[test]
    fn test_parse_events() {
        assert_eq!(
            DriverEvent::parse(r#"{"event":"progress","percent":0.5,"message":"building"}"#),
            Some(DriverEvent::Progress {
                percent: 0.5,
                message: "building".to_string()
            })
        );
        let done = DriverEvent::parse(r#"{"event":"done","hash":"abc","errors":["x"]}"#).unwrap();
        match done {
            DriverEvent::Done(stats) => {
                assert_eq!(stats.hash.as_deref(), Some("abc"));
                assert!(stats.has_errors());
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(DriverEvent::parse("Compiling..."), None);
    }

    #[tokio::test]
    async fn test_in_memory_stream_ends_when_sender_drops() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = RebuildStream::new(rx);
        tx.send(CompileStats::default()).await.unwrap();
        drop(tx);

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
        assert_eq!(stream.wait().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_command_is_external_failure() {
        let root = TempDir::new().unwrap();
        let driver = ProcessDriver::new(vec![], root.path().to_path_buf());
        let err = driver.run(&config(root.path())).await.unwrap_err();
        assert!(matches!(err, ToolError::ExternalToolFailure { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_driver_run_reads_done_event() {
        let root = TempDir::new().unwrap();
        let script = root.path().join("driver.sh");
        std::fs::write(
            &script,
            "cat > /dev/null\n\
             echo 'starting'\n\
             echo '{\"event\":\"progress\",\"percent\":0.5,\"message\":\"modules\"}'\n\
             echo '{\"event\":\"done\",\"hash\":\"h1\",\"timeMs\":5,\"assets\":[],\"warnings\":[],\"errors\":[]}'\n",
        )
        .unwrap();

        let driver = ProcessDriver::new(
            vec!["sh".to_string(), script.to_string_lossy().into_owned()],
            root.path().to_path_buf(),
        );
        let stats = driver.run(&config(root.path())).await.unwrap();

        assert_eq!(stats.hash.as_deref(), Some("h1"));
        assert_eq!(stats.time_ms, 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_driver_reports_failure() {
        let root = TempDir::new().unwrap();
        let script = root.path().join("driver.sh");
        std::fs::write(
            &script,
            "cat > /dev/null\necho '{\"event\":\"failed\",\"message\":\"webpack not installed\"}'\nexit 2\n",
        )
        .unwrap();

        let driver = ProcessDriver::new(
            vec!["sh".to_string(), script.to_string_lossy().into_owned()],
            root.path().to_path_buf(),
        );
        let err = driver.run(&config(root.path())).await.unwrap_err();

        assert!(err.to_string().contains("webpack not installed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_driver_watch_streams_rebuilds() {
        let root = TempDir::new().unwrap();
        let script = root.path().join("driver.sh");
        std::fs::write(
            &script,
            "cat > /dev/null\n\
             echo '{\"event\":\"done\",\"hash\":\"a\"}'\n\
             echo '{\"event\":\"done\",\"hash\":\"b\",\"errors\":[\"bad\"]}'\n",
        )
        .unwrap();

        let driver = ProcessDriver::new(
            vec!["sh".to_string(), script.to_string_lossy().into_owned()],
            root.path().to_path_buf(),
        );
        let mut stream = driver.watch(&config(root.path()), DriverMode::Watch).await.unwrap();

        assert_eq!(stream.next().await.unwrap().hash.as_deref(), Some("a"));
        assert!(stream.next().await.unwrap().has_errors());
        assert!(stream.next().await.is_none());
        assert!(stream.wait().await.unwrap().unwrap().success());
    }
}
