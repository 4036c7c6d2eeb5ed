//! Serve task

use url::Url;

use super::{report_stats, Workspace};
use crate::bundler::{AppBundleConfig, ConfigBuildOptions, ServeConfig};
use crate::config::BuildTarget;
use crate::driver::{BundlerDriver, CompileStats, DriverMode, RebuildStream};
use crate::error::{Result, ToolError};
use crate::utils::{browser, logger, net};

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    pub app: Option<String>,
    pub target: BuildTarget,
    pub verbose: bool,
    pub ssl: bool,
    pub host: String,
    pub port: u16,
    /// Host the browser should use when it differs from the bind address
    pub public_host: Option<String>,
    pub hmr: bool,
    pub circular: bool,
    pub vendor: bool,
    /// Open a browser after the first build
    pub open: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            app: None,
            target: BuildTarget::Development,
            verbose: false,
            ssl: false,
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            public_host: None,
            hmr: false,
            circular: false,
            vendor: false,
            open: true,
        }
    }
}

impl ServeOptions {
    /// Hot module replacement is only honoured for development builds
    pub fn with_hmr(mut self, requested: bool) -> Self {
        self.hmr = requested && !self.target.is_production();
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.ssl {
            "https"
        } else {
            "http"
        }
    }
}

pub struct ServeTask {
    workspace: Workspace,
    options: ServeOptions,
}

impl ServeTask {
    pub fn new(workspace: Workspace, options: ServeOptions) -> Self {
        Self { workspace, options }
    }

    pub fn options(&self) -> &ServeOptions {
        &self.options
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Serve until the dev server goes away
    pub async fn run(self) -> Result<()> {
        let driver = self.workspace.driver();
        let mut session = self.start(&driver).await?;

        while session.next_rebuild().await.is_some() {}

        session.finish().await
    }

    /// Build the serve configuration and hand it to the driver.
    ///
    /// The returned session yields one result per rebuild.
    pub async fn start(&self, driver: &dyn BundlerDriver) -> Result<ServeSession> {
        let options = &self.options;
        let app = self.workspace.app(options.app.as_deref())?;

        let port = net::check_port(&options.host, options.port, DEFAULT_PORT).await?;

        let build_options = ConfigBuildOptions {
            target: options.target,
            serve: Some(ServeConfig {
                host: options.host.clone(),
                port,
                ssl: options.ssl,
                hmr: options.hmr,
                public_host: options.public_host.clone(),
            }),
            circular: options.circular,
            vendor: options.vendor,
            verbose: options.verbose,
        };

        if build_options.hot_reload() {
            logger::warn("Hot Module Replacement (HMR) is enabled for the dev server.");
        }

        let config = AppBundleConfig::new(app, self.workspace.root()).build(&build_options)?;
        self.workspace.clear_output(&app.out_dir)?;

        let address = server_address(options.scheme(), &options.host, port)?;
        logger::info(format!(
            "Development Server is listening on {}:{}.",
            options.host, port
        ));

        let rebuilds = driver.watch(&config, DriverMode::Serve).await?;

        Ok(ServeSession::new(address, port, rebuilds, options.verbose, options.open))
    }
}

/// A running dev server
pub struct ServeSession {
    pub address: Url,
    pub port: u16,
    rebuilds: RebuildStream,
    verbose: bool,
    open_browser: bool,
}

impl ServeSession {
    pub fn new(address: Url, port: u16, rebuilds: RebuildStream, verbose: bool, open_browser: bool) -> Self {
        Self {
            address,
            port,
            rebuilds,
            verbose,
            open_browser,
        }
    }

    /// Wait for the next rebuild and report it
    pub async fn next_rebuild(&mut self) -> Option<CompileStats> {
        let stats = self.rebuilds.next().await?;
        report_stats(&stats, self.verbose);

        if self.open_browser {
            self.open_browser = false;
            if let Err(e) = browser::open(self.address.as_str()) {
                logger::warn(format!("Could not open a browser: {}", e));
            }
        }

        Some(stats)
    }

    /// Stop the dev server
    pub async fn cancel(self) {
        self.rebuilds.cancel().await;
    }

    /// Wait for the dev server to exit and check how it went
    pub async fn finish(self) -> Result<()> {
        match self.rebuilds.wait().await? {
            Some(status) if !status.success() => Err(ToolError::external(
                "bundler",
                format!("dev server exited with {}", status),
            )),
            _ => Ok(()),
        }
    }
}

/// Address a browser should open; a wildcard bind is reached via localhost
pub fn server_address(scheme: &str, host: &str, port: u16) -> Result<Url> {
    let host = if host == "0.0.0.0" { "localhost" } else { host };
    Url::parse(&format!("{}://{}:{}", scheme, host, port))
        .map_err(|e| ToolError::external("dev server", format!("invalid address {}:{}: {}", host, port, e)))
}
