//! End-to-end task: serve the app, then run Protractor against it

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use super::serve::{ServeOptions, ServeSession, ServeTask};
use super::Workspace;
use crate::driver::CompileStats;
use crate::error::{Result, ToolError};
use crate::toolchain::{self, Toolchain};
use crate::utils::logger;

static HAS_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+://").expect("valid regex"));

const REBUILD_REJECTED: &str = "Build did not succeed. Please fix errors before running e2e task";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct E2eOptions {
    pub serve: ServeOptions,
    /// Protractor config; defaults to `e2e.protractor.config`
    pub config: Option<PathBuf>,
    pub webdriver_update: bool,
    pub element_explorer: bool,
    pub specs: Vec<String>,
}

/// Decides what a rebuild means while e2e tests are pending or running.
///
/// Only the very first rebuild may start the tests, and only if it is
/// clean. Every later rebuild fails the run, even a clean one.
#[derive(Debug)]
pub struct RebuildGate {
    first_rebuild: bool,
}

impl RebuildGate {
    pub fn new() -> Self {
        Self { first_rebuild: true }
    }

    /// `Ok` means start the tests now
    pub fn observe(&mut self, stats: &CompileStats) -> Result<()> {
        if self.first_rebuild && !stats.has_errors() {
            self.first_rebuild = false;
            Ok(())
        } else {
            Err(ToolError::CompilationFailed(REBUILD_REJECTED.to_string()))
        }
    }

    pub fn is_consumed(&self) -> bool {
        !self.first_rebuild
    }
}

impl Default for RebuildGate {
    fn default() -> Self {
        Self::new()
    }
}

pub struct E2eTask {
    serve: ServeTask,
    options: E2eOptions,
    protractor_config: PathBuf,
}

impl E2eTask {
    pub fn new(workspace: Workspace, mut options: E2eOptions) -> Result<Self> {
        let protractor_config = match &options.config {
            Some(path) => workspace.root().join(path),
            None => workspace.config().protractor_config()?,
        };

        // protractor drives its own browser
        options.serve.open = false;

        Ok(Self {
            serve: ServeTask::new(workspace, options.serve.clone()),
            options,
            protractor_config,
        })
    }

    pub fn options(&self) -> &E2eOptions {
        &self.options
    }

    /// Start the dev server, wait for a clean first build, run Protractor.
    ///
    /// Returns Protractor's exit code.
    pub async fn run(self) -> Result<i32> {
        let driver = self.serve.workspace().driver();
        let session = self.serve.start(&driver).await?;

        let serve = &self.options.serve;
        let base_url = base_url(serve.public_host.as_deref(), serve.ssl, &serve.host, session.port)?;
        let runner = ProtractorRun {
            toolchain: self.serve.workspace().toolchain().clone(),
            config: self.protractor_config.clone(),
            base_url,
            webdriver_update: self.options.webdriver_update,
            element_explorer: self.options.element_explorer,
            specs: self.options.specs.clone(),
        };

        serve_and_run(session, || runner.run()).await
    }
}

/// Gate the test run on the session's rebuilds.
///
/// Tests start once, after the first clean rebuild. Any other rebuild
/// stops everything with [`ToolError::CompilationFailed`].
pub async fn serve_and_run<F, Fut>(mut session: ServeSession, run_tests: F) -> Result<i32>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<i32>>,
{
    let mut gate = RebuildGate::new();

    let first = session.next_rebuild().await.ok_or_else(|| {
        ToolError::external("bundler", "dev server stopped before the first build finished")
    })?;
    gate.observe(&first)?;

    let tests = run_tests();
    tokio::pin!(tests);

    loop {
        tokio::select! {
            result = &mut tests => {
                session.cancel().await;
                return result;
            }
            rebuild = session.next_rebuild() => match rebuild {
                Some(stats) => gate.observe(&stats)?,
                None => return tests.await,
            }
        }
    }
}

/// Base URL Protractor points the browser at
pub fn base_url(public_host: Option<&str>, ssl: bool, host: &str, port: u16) -> Result<Url> {
    let scheme = if ssl { "https" } else { "http" };

    let raw = match public_host {
        Some(public) if HAS_SCHEME.is_match(public) => public.to_string(),
        Some(public) => format!("{}://{}", scheme, public),
        None => format!("{}://{}:{}", scheme, host, port),
    };

    Url::parse(&raw).map_err(|e| ToolError::external("protractor", format!("invalid base url '{}': {}", raw, e)))
}

struct ProtractorRun {
    toolchain: Toolchain,
    config: PathBuf,
    base_url: Url,
    webdriver_update: bool,
    element_explorer: bool,
    specs: Vec<String>,
}

impl ProtractorRun {
    async fn run(self) -> Result<i32> {
        let cwd = self.toolchain.root().to_path_buf();

        if self.webdriver_update {
            let command = self.toolchain.webdriver_manager()?;
            logger::info("Updating webdriver-manager...");
            let status = toolchain::command("webdriver-manager", &command, &cwd)?
                .args(["update", "--standalone", "false", "--gecko", "false", "--quiet"])
                .status()
                .await
                .map_err(|e| ToolError::external("webdriver-manager", e.to_string()))?;

            if !status.success() {
                return Err(ToolError::external(
                    "webdriver-manager",
                    format!("update exited with {}", status),
                ));
            }
        }

        let mut protractor = toolchain::command("protractor", &self.toolchain.protractor(), &cwd)?;
        protractor
            .arg(&self.config)
            .arg(format!("--baseUrl={}", self.base_url))
            .stdin(Stdio::inherit())
            .kill_on_drop(true);

        if self.element_explorer {
            protractor.arg("--elementExplorer");
        }
        if !self.specs.is_empty() {
            protractor.arg("--specs").arg(self.specs.join(","));
        }

        debug!("Running protractor against {}", self.base_url);
        logger::info(format!("Running e2e tests against {}", self.base_url));

        let status = protractor
            .status()
            .await
            .map_err(|e| ToolError::external("protractor", e.to_string()))?;
        let code = status.code().unwrap_or(1);

        if code == 0 {
            logger::info("Protractor finished successfully.");
        } else {
            logger::error(format!("Protractor has exited with {}.", code));
        }

        Ok(code)
    }
}
