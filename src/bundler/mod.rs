//! Bundle configuration builder
//!
//! Turns an app record plus build options into the declarative
//! configuration handed to the external bundler driver. Building is pure
//! apart from resolving `node_modules` through the real filesystem and
//! checking which asset paths are directories.

pub mod css;
pub mod entries;
pub mod plugins;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use globset::Glob;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::config::{AppConfig, AssetEntry, BuildTarget};
use crate::error::{Result, ToolError};
use crate::utils::resolve_path;

use self::css::CssRuleOptions;
use self::plugins::{
    AngularCompilerOptions, CommonsChunkOptions, CompilerOptions, CopyFrom, CopyPattern,
    HtmlMinify, HtmlOptions, MinChunks, Plugin,
};

pub use self::entries::{lazy_chunks, parse_css_entries, CssEntries, ParsedEntry};

/// Client entries prepended to `main` when hot reload is on
pub const HOT_RELOAD_CLIENT: &str = "webpack-dev-server/client";
pub const HOT_RELOAD_DEV_SERVER: &str = "webpack/hot/dev-server";

/// Order in which entry chunks are injected into the HTML
const ENTRY_POINT_ORDER: [&str; 6] = ["inline", "polyfills", "sw-register", "styles", "vendor", "main"];

/// One loader invocation inside a rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loader {
    pub loader: String,

    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

impl Loader {
    pub fn new(loader: impl Into<String>) -> Self {
        Self {
            loader: loader.into(),
            options: serde_json::Value::Null,
        }
    }

    pub fn with_options(loader: impl Into<String>, options: serde_json::Value) -> Self {
        Self {
            loader: loader.into(),
            options,
        }
    }
}

/// A module rule; `test` is a regular expression source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub test: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<PathBuf>,

    /// Loaders, applied last to first by the bundler
    #[serde(rename = "use")]
    pub loader_chain: Vec<Loader>,
}

impl Rule {
    fn new(test: &str, loader_chain: Vec<Loader>) -> Self {
        Self {
            test: test.to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            loader_chain,
        }
    }
}

/// The complete configuration for one bundler invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerConfiguration {
    pub mode: BuildTarget,
    pub context: PathBuf,
    pub resolve: Resolve,
    pub resolve_loader: ResolveLoader,
    pub entry: BTreeMap<String, Vec<String>>,
    pub output: Output,
    pub module: ModuleRules,
    pub plugins: Vec<Plugin>,
    pub node: NodeShims,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_server: Option<DevServer>,
}

impl BundlerConfiguration {
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|plugin| plugin.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolve {
    pub extensions: Vec<String>,
    pub modules: Vec<PathBuf>,
    pub symlinks: bool,
    pub main_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolveLoader {
    pub modules: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub path: PathBuf,
    pub filename: String,
    pub chunk_filename: String,
    pub cross_origin_loading: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRules {
    pub rules: Vec<Rule>,
}

/// Node built-in shims for browser bundles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeShims {
    pub fs: &'static str,
    pub global: bool,
    pub crypto: &'static str,
    pub tls: &'static str,
    pub net: &'static str,
    pub process: bool,
    pub module: bool,
    pub clear_immediate: bool,
    pub set_immediate: bool,
}

impl Default for NodeShims {
    fn default() -> Self {
        Self {
            fs: "empty",
            global: true,
            crypto: "empty",
            tls: "empty",
            net: "empty",
            process: true,
            module: false,
            clear_immediate: false,
            set_immediate: false,
        }
    }
}

/// Options for the driver's dev server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServer {
    pub host: String,
    pub port: u16,
    pub https: bool,
    pub headers: BTreeMap<String, String>,
    pub history_api_fallback: HistoryApiFallback,
    pub stats: &'static str,
    pub inline: bool,
    pub compress: bool,
    pub overlay: Overlay,
    pub content_base: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<String>,

    pub disable_host_check: bool,
    pub public_path: String,
    pub hot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryApiFallback {
    pub index: String,
    pub disable_dot_rule: bool,
    pub html_accept_headers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overlay {
    pub errors: bool,
    pub warnings: bool,
}

/// Dev-server settings, present only when serving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub hmr: bool,
    pub public_host: Option<String>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ssl: false,
            hmr: false,
            public_host: None,
        }
    }
}

/// Options that shape one configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigBuildOptions {
    pub target: BuildTarget,
    pub serve: Option<ServeConfig>,
    /// Warn about circular imports
    pub circular: bool,
    /// Split `node_modules` code into a vendor chunk
    pub vendor: bool,
    pub verbose: bool,
}

impl ConfigBuildOptions {
    pub fn new(target: BuildTarget) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    pub fn serving(mut self, serve: ServeConfig) -> Self {
        self.serve = Some(serve);
        self
    }

    /// Hot reload needs a dev server, the hmr flag and a development build
    pub fn hot_reload(&self) -> bool {
        !self.target.is_production() && self.serve.as_ref().is_some_and(|serve| serve.hmr)
    }
}

/// Resolved directories used throughout one build
struct Paths {
    context: PathBuf,
    app_root: PathBuf,
    out_dir: PathBuf,
    node_modules: PathBuf,
    real_node_modules: PathBuf,
    gendir_node_modules: PathBuf,
}

impl Paths {
    fn new(app: &AppConfig, project_root: &Path) -> Self {
        let node_modules = project_root.join("node_modules");
        let real_node_modules = fs::canonicalize(&node_modules).unwrap_or_else(|e| {
            debug!("Using {} unresolved: {}", node_modules.display(), e);
            node_modules.clone()
        });
        let app_root = resolve_path(project_root, &app.root);

        Self {
            context: project_root.to_path_buf(),
            out_dir: resolve_path(project_root, &app.out_dir),
            gendir_node_modules: app_root.join("$$_gendir").join("node_modules"),
            app_root,
            node_modules,
            real_node_modules,
        }
    }
}

/// Builds bundler configurations for one app
pub struct AppBundleConfig<'a> {
    app: &'a AppConfig,
    project_root: &'a Path,
}

impl<'a> AppBundleConfig<'a> {
    pub fn new(app: &'a AppConfig, project_root: &'a Path) -> Self {
        Self { app, project_root }
    }

    /// Produce a fresh configuration; the app record is only read
    pub fn build(&self, options: &ConfigBuildOptions) -> Result<BundlerConfiguration> {
        let main = self.app.main.as_deref().ok_or_else(|| ToolError::MissingEntryPoint {
            app: self.app.display_name().to_string(),
        })?;

        let paths = Paths::new(self.app, self.project_root);
        let is_prod = options.target.is_production();

        let css_entries = parse_css_entries(&paths.app_root, &self.app.styles);

        let mut entry = BTreeMap::new();
        entry.insert("main".to_string(), self.main_entry(&paths, main, options));
        entry.insert(
            "polyfills".to_string(),
            vec![path_string(&paths.app_root.join(&self.app.polyfills))],
        );
        for (name, files) in &css_entries.entries {
            entry.insert(name.clone(), files.iter().map(|f| path_string(f)).collect());
        }

        let output = Output {
            path: paths.out_dir.clone(),
            filename: if is_prod {
                "[name].[chunkhash:20].bundle.js".to_string()
            } else {
                "[name].bundle.js".to_string()
            },
            chunk_filename: if is_prod {
                "[id].[chunkhash:20].chunk.js".to_string()
            } else {
                "[id].chunk.js".to_string()
            },
            cross_origin_loading: false,
            public_path: (!self.app.deploy_url.is_empty()).then(|| self.app.deploy_url.clone()),
        };

        let modules = vec![paths.node_modules.clone(), paths.real_node_modules.clone()];

        Ok(BundlerConfiguration {
            mode: options.target,
            context: paths.context.clone(),
            resolve: Resolve {
                extensions: vec![".ts".to_string(), ".js".to_string()],
                modules: modules.clone(),
                symlinks: true,
                main_fields: vec!["browser".to_string(), "module".to_string(), "main".to_string()],
            },
            resolve_loader: ResolveLoader { modules },
            entry,
            output,
            module: ModuleRules {
                rules: self.rules(&paths, &css_entries, options),
            },
            plugins: self.plugins(&paths, main, options)?,
            node: NodeShims::default(),
            dev_server: options
                .serve
                .as_ref()
                .map(|serve| self.dev_server(serve, options)),
        })
    }

    fn main_entry(&self, paths: &Paths, main: &str, options: &ConfigBuildOptions) -> Vec<String> {
        let mut entry = Vec::new();

        if options.hot_reload() {
            let ssl = options.serve.as_ref().is_some_and(|serve| serve.ssl);
            let scheme = if ssl { "https" } else { "http" };
            entry.push(format!("{}?{}://0.0.0.0:0", HOT_RELOAD_CLIENT, scheme));
            entry.push(HOT_RELOAD_DEV_SERVER.to_string());
        }

        entry.push(path_string(&paths.app_root.join(main)));
        entry
    }

    fn rules(&self, paths: &Paths, css_entries: &CssEntries, options: &ConfigBuildOptions) -> Vec<Rule> {
        let is_prod = options.target.is_production();
        let asset_options = json!({ "name": "[name].[hash:20].[ext]", "limit": 10000 });
        let build_optimizer = Loader::with_options(
            "@angular-devkit/build-optimizer/webpack-loader",
            json!({ "sourceMap": false }),
        );

        let mut rules = vec![
            Rule::new(r"\.html$", vec![Loader::new("raw-loader")]),
            Rule::new(
                r"\.(eot|svg|cur)$",
                vec![Loader::with_options("file-loader", asset_options.clone())],
            ),
            Rule::new(
                r"\.(jpg|png|webp|gif|otf|ttf|woff|woff2|ani)$",
                vec![Loader::with_options("url-loader", asset_options)],
            ),
        ];

        if is_prod {
            rules.push(Rule::new(r"\.js$", vec![build_optimizer.clone()]));
        }

        rules.extend(css::css_rules(&CssRuleOptions {
            target: options.target,
            global_style_paths: &css_entries.global,
            sourcemaps: !is_prod,
            extract: is_prod,
            deploy_url: &self.app.deploy_url,
            base_href: self.app.base_href.as_deref().unwrap_or(""),
            include_paths: self
                .app
                .style_preprocessor_options
                .include_paths
                .iter()
                .map(|p| resolve_path(&paths.app_root, p))
                .collect(),
        }));

        if is_prod {
            rules.push(Rule::new(
                r"(?:\.ngfactory\.js|\.ngstyle\.js|\.ts)$",
                vec![build_optimizer, Loader::new("@ngtools/webpack")],
            ));
        } else {
            rules.push(Rule::new(r"\.ts$", vec![Loader::new("@ngtools/webpack")]));
        }

        rules
    }

    fn plugins(&self, paths: &Paths, main: &str, options: &ConfigBuildOptions) -> Result<Vec<Plugin>> {
        let target = options.target;
        let is_prod = target.is_production();

        let mut plugins = vec![
            Plugin::LoaderOptions { debug: true },
            Plugin::NoEmitOnErrors,
            Plugin::Copy {
                patterns: self.copy_patterns(paths)?,
                ignore: vec![
                    ".gitkeep".to_string(),
                    "**/.DS_Store".to_string(),
                    "**/Thumbs.db".to_string(),
                ],
            },
            Plugin::Progress,
        ];

        if options.circular {
            plugins.push(Plugin::CircularDependency {
                exclude: r"(\\|/)node_modules(\\|/)".to_string(),
                fail_on_error: false,
            });
        }

        if !is_prod {
            plugins.push(Plugin::NamedLazyChunks);
        }

        plugins.push(Plugin::Html(HtmlOptions {
            template: paths.app_root.join(&self.app.index),
            filename: paths.out_dir.join(&self.app.index),
            minify: is_prod.then_some(HtmlMinify {
                case_sensitive: true,
                collapse_whitespace: true,
                keep_closing_slash: true,
            }),
            exclude_chunks: lazy_chunks(&paths.app_root, &self.app.scripts, &self.app.styles),
            xhtml: true,
            chunks_sort_order: ENTRY_POINT_ORDER.iter().map(|e| e.to_string()).collect(),
        }));

        plugins.push(Plugin::BaseHref {
            base_href: self.app.base_href.clone(),
        });

        plugins.push(Plugin::CommonsChunk(CommonsChunkOptions {
            name: "inline".to_string(),
            chunks: Vec::new(),
            min_chunks: MinChunks::Infinity,
            async_name: None,
            children: false,
        }));

        if options.vendor {
            plugins.push(Plugin::CommonsChunk(CommonsChunkOptions {
                name: "vendor".to_string(),
                chunks: vec!["main".to_string()],
                min_chunks: MinChunks::ModulesUnder(vec![
                    paths.node_modules.clone(),
                    paths.gendir_node_modules.clone(),
                    paths.real_node_modules.clone(),
                ]),
                async_name: None,
                children: false,
            }));
        }

        if !is_prod {
            // eval source maps rebuild faster under the dev server
            if options.serve.is_some() {
                plugins.push(Plugin::EvalSourceMapDevTool {
                    module_filename_template: "[resource-path]".to_string(),
                    source_root: "webpack:///".to_string(),
                });
            } else {
                plugins.push(Plugin::SourceMapDevTool {
                    filename: "[file].map[query]".to_string(),
                    module_filename_template: "[resource-path]".to_string(),
                    fallback_module_filename_template: "[resource-path]?[hash]".to_string(),
                    source_root: "webpack:///".to_string(),
                });
            }
        }

        plugins.push(Plugin::CommonsChunk(CommonsChunkOptions {
            name: "main".to_string(),
            chunks: Vec::new(),
            min_chunks: MinChunks::Count(2),
            async_name: Some("common".to_string()),
            children: true,
        }));

        if is_prod {
            plugins.extend(production_plugins(target, options.verbose));
        } else {
            plugins.push(Plugin::NamedModules);
        }

        plugins.push(Plugin::AngularCompiler(self.compiler_options(paths, main, options)));

        if options.hot_reload() {
            plugins.push(Plugin::HotModuleReplacement);
        }

        Ok(plugins)
    }

    fn compiler_options(&self, paths: &Paths, main: &str, options: &ConfigBuildOptions) -> AngularCompilerOptions {
        let is_prod = options.target.is_production();

        let mut host_replacement_paths = BTreeMap::new();
        if let (Some(source), Some(environments)) = (&self.app.environment_source, &self.app.environments) {
            let replacement = if is_prod { &environments.prod } else { &environments.dev };
            host_replacement_paths.insert(paths.app_root.join(source), paths.app_root.join(replacement));
        }

        // the dev server reloads CommonJS modules faster
        let force_commonjs = options.serve.is_some() && !is_prod;

        AngularCompilerOptions {
            main_path: paths.app_root.join(main),
            platform: self.app.platform,
            host_replacement_paths,
            source_map: !is_prod,
            ts_config_path: paths.app_root.join(&self.app.tsconfig),
            skip_code_generation: !is_prod,
            compiler_options: CompilerOptions {
                module: force_commonjs.then(|| "commonjs".to_string()),
            },
        }
    }

    /// Copy patterns for the app's assets, validated as globs
    fn copy_patterns(&self, paths: &Paths) -> Result<Vec<CopyPattern>> {
        let patterns: Vec<CopyPattern> = if self.app.assets.is_empty() {
            ["assets/**/*", "favicon.ico"]
                .iter()
                .map(|glob| copy_pattern(paths.app_root.clone(), glob, ""))
                .collect()
        } else {
            self.app
                .assets
                .iter()
                .map(|asset| match asset {
                    AssetEntry::Path(path) => {
                        let glob = if paths.app_root.join(path).is_dir() {
                            format!("{}/**/*", path.trim_end_matches('/'))
                        } else {
                            path.clone()
                        };
                        copy_pattern(paths.app_root.clone(), &glob, "")
                    }
                    AssetEntry::Glob { glob, input, output } => {
                        copy_pattern(resolve_path(&paths.app_root, input), glob, output)
                    }
                })
                .collect()
        };

        for pattern in &patterns {
            Glob::new(&pattern.from.glob).map_err(|e| ToolError::InvalidAsset {
                pattern: pattern.from.glob.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(patterns)
    }

    fn dev_server(&self, serve: &ServeConfig, options: &ConfigBuildOptions) -> DevServer {
        let mut headers = BTreeMap::new();
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());

        DevServer {
            host: serve.host.clone(),
            port: serve.port,
            https: serve.ssl,
            headers,
            history_api_fallback: HistoryApiFallback {
                index: format!("/{}", self.app.index),
                disable_dot_rule: true,
                html_accept_headers: vec!["text/html".to_string(), "application/xhtml+xml".to_string()],
            },
            stats: if options.verbose { "verbose" } else { "none" },
            inline: true,
            compress: options.target.is_production(),
            overlay: Overlay {
                errors: !options.target.is_production(),
                warnings: false,
            },
            content_base: false,
            public: serve.public_host.clone(),
            disable_host_check: true,
            public_path: "/".to_string(),
            hot: options.hot_reload(),
        }
    }
}

fn production_plugins(target: BuildTarget, verbose: bool) -> Vec<Plugin> {
    vec![
        Plugin::ExtractText {
            filename: "[name].[contenthash:20].bundle.css".to_string(),
        },
        Plugin::SuppressExtractedTextChunks,
        Plugin::Environment { node_env: target },
        Plugin::HashedModuleIds,
        Plugin::ModuleConcatenation,
        Plugin::License {
            pattern: "^(MIT|ISC|BSD.*)$".to_string(),
            suppress_errors: true,
            per_chunk_output: false,
            output_filename: "3rdpartylicenses.txt".to_string(),
        },
        Plugin::Purify,
        Plugin::UglifyJs {
            source_map: false,
            uglify_options: json!({
                "output": { "ascii_only": true, "comments": false, "webkit": true },
                "ecma": 5,
                "warnings": verbose,
                "ie8": false,
                "mangle": { "safari10": true },
                "compress": { "pure_getters": true, "passes": 3, "typeofs": false },
            }),
        },
        Plugin::Compression {
            test: r"\.js$|\.html$".to_string(),
            threshold: 10240,
            min_ratio: 0.8,
        },
    ]
}

fn copy_pattern(context: PathBuf, glob: &str, to: &str) -> CopyPattern {
    CopyPattern {
        context,
        to: to.to_string(),
        from: CopyFrom {
            glob: glob.to_string(),
            dot: true,
        },
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
