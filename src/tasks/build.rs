//! Build task

use std::fs;
use std::time::Instant;

use tracing::debug;

use super::{report_stats, Workspace};
use crate::bundler::{AppBundleConfig, ConfigBuildOptions};
use crate::config::BuildTarget;
use crate::driver::{BundlerDriver, DriverMode};
use crate::error::{Result, ToolError};
use crate::utils::{format_duration, logger};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// App name or index
    pub app: Option<String>,
    pub target: BuildTarget,
    pub verbose: bool,
    pub watch: bool,
    /// Write `stats.json` next to the bundles
    pub stats: bool,
    pub circular: bool,
    pub vendor: bool,
}

pub struct BuildTask {
    workspace: Workspace,
    options: BuildOptions,
}

impl BuildTask {
    pub fn new(workspace: Workspace, options: BuildOptions) -> Self {
        Self { workspace, options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub async fn run(self) -> Result<()> {
        let driver = self.workspace.driver();
        self.run_with(&driver).await
    }

    pub async fn run_with(self, driver: &dyn BundlerDriver) -> Result<()> {
        let options = &self.options;
        let app = self.workspace.app(options.app.as_deref())?;

        if app.main.is_none() {
            return Err(ToolError::MissingEntryPoint {
                app: app.display_name().to_string(),
            });
        }

        logger::info(format!(
            "Preparing to build '{}' in {} mode.",
            app.display_name(),
            options.target.as_str().to_uppercase()
        ));

        if app.service_worker {
            logger::warn("Service worker generation is not supported by this tool and will be skipped.");
        }

        let config = AppBundleConfig::new(app, self.workspace.root()).build(&ConfigBuildOptions {
            target: options.target,
            serve: None,
            circular: options.circular,
            vendor: options.vendor,
            verbose: options.verbose,
        })?;

        let output_dir = self.workspace.clear_output(&app.out_dir)?;
        let start = Instant::now();

        if options.watch {
            let mut rebuilds = driver.watch(&config, DriverMode::Watch).await?;
            while let Some(stats) = rebuilds.next().await {
                report_stats(&stats, options.verbose);
            }

            return match rebuilds.wait().await? {
                Some(status) if !status.success() => Err(ToolError::external(
                    "bundler",
                    format!("watcher exited with {}", status),
                )),
                _ => Ok(()),
            };
        }

        let stats = driver.run(&config).await?;
        debug!("Build finished in {}", format_duration(start.elapsed()));
        report_stats(&stats, options.verbose);

        if options.stats {
            let path = output_dir.join("stats.json");
            let json = serde_json::to_string_pretty(&stats)
                .map_err(|e| ToolError::external("bundler", format!("unreadable stats: {}", e)))?;
            fs::write(&path, json)?;
            logger::info(format!("Wrote {}", path.display()));
        }

        if stats.has_errors() {
            return Err(ToolError::CompilationFailed(format!(
                "Build failed with {} error(s).",
                stats.errors.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CompileStats;
    use crate::tasks::testing::{project, FakeDriver};

    fn clean() -> CompileStats {
        CompileStats {
            hash: Some("abc".to_string()),
            ..CompileStats::default()
        }
    }

    fn task(root: &std::path::Path, options: BuildOptions) -> BuildTask {
        BuildTask::new(Workspace::discover(root).unwrap(), options)
    }

    #[tokio::test]
    async fn test_build_clears_output_before_bundling() {
        let root = project();
        let dist = root.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join("stale.bundle.js"), "old").unwrap();

        let driver = FakeDriver::with_results(vec![clean()]);
        task(root.path(), BuildOptions::default()).run_with(&driver).await.unwrap();

        assert!(dist.is_dir());
        assert!(!dist.join("stale.bundle.js").exists());
        assert_eq!(driver.modes.lock().unwrap().as_slice(), &[DriverMode::Run]);
    }

    #[tokio::test]
    async fn test_build_passes_target_to_configuration() {
        let root = project();
        let driver = FakeDriver::with_results(vec![clean()]);
        let options = BuildOptions {
            target: BuildTarget::Production,
            ..BuildOptions::default()
        };
        let build = task(root.path(), options);
        assert!(build.options().target.is_production());
        build.run_with(&driver).await.unwrap();

        let seen = driver.seen.lock().unwrap();
        assert_eq!(seen[0].mode, BuildTarget::Production);
        assert!(seen[0].dev_server.is_none());
    }

    #[tokio::test]
    async fn test_compilation_errors_fail_the_build() {
        let root = project();
        let failing = CompileStats {
            errors: vec!["src/app.ts: Cannot find name 'Hero'".to_string()],
            ..CompileStats::default()
        };
        let driver = FakeDriver::with_results(vec![failing]);
        let options = BuildOptions {
            stats: true,
            ..BuildOptions::default()
        };

        let err = task(root.path(), options).run_with(&driver).await.unwrap_err();

        assert!(matches!(err, ToolError::CompilationFailed(_)));
        assert!(root.path().join("dist/stats.json").is_file());
    }

    #[tokio::test]
    async fn test_app_without_main_is_rejected_before_clearing() {
        let root = project();
        let lib_out = root.path().join("dist-lib");
        fs::create_dir_all(&lib_out).unwrap();
        fs::write(lib_out.join("keep.txt"), "").unwrap();

        let driver = FakeDriver::default();
        let options = BuildOptions {
            app: Some("no-main".to_string()),
            ..BuildOptions::default()
        };
        let err = task(root.path(), options).run_with(&driver).await.unwrap_err();

        assert!(matches!(err, ToolError::MissingEntryPoint { .. }));
        assert!(lib_out.join("keep.txt").exists());
        assert!(driver.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_watch_reports_every_rebuild_and_ends_with_driver() {
        let root = project();
        let broken = CompileStats {
            errors: vec!["oops".to_string()],
            ..CompileStats::default()
        };
        let driver = FakeDriver::with_results(vec![clean(), broken, clean()]);
        let options = BuildOptions {
            watch: true,
            ..BuildOptions::default()
        };

        task(root.path(), options).run_with(&driver).await.unwrap();

        assert_eq!(driver.modes.lock().unwrap().as_slice(), &[DriverMode::Watch]);
        assert!(driver.results.lock().unwrap().is_empty());
    }
}
