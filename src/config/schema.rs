//! Configuration schema definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One buildable application from the `apps` list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Name of the app
    #[serde(default)]
    pub name: String,

    /// Root directory of the app, relative to the project root
    #[serde(default = "default_root")]
    pub root: String,

    /// Output directory for build results
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Static assets copied into the output directory
    #[serde(default)]
    pub assets: Vec<AssetEntry>,

    /// URL where files will be deployed
    #[serde(default)]
    pub deploy_url: String,

    /// Base url for the application being built
    #[serde(default)]
    pub base_href: Option<String>,

    /// Runtime platform of the app
    #[serde(default)]
    pub platform: Platform,

    /// Start HTML file
    #[serde(default = "default_index")]
    pub index: String,

    /// Main entry-point file
    #[serde(default)]
    pub main: Option<String>,

    #[serde(default = "default_polyfills")]
    pub polyfills: String,

    /// Test entry-point file
    #[serde(default)]
    pub test: Option<String>,

    #[serde(default = "default_tsconfig")]
    pub tsconfig: String,

    #[serde(default)]
    pub test_tsconfig: Option<String>,

    /// Prefix applied to generated selectors
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default)]
    pub service_worker: bool,

    /// Global styles included in the build
    #[serde(default)]
    pub styles: Vec<ExtraEntry>,

    #[serde(default)]
    pub style_preprocessor_options: StylePreprocessorOptions,

    /// Global scripts included in the build
    #[serde(default)]
    pub scripts: Vec<ExtraEntry>,

    /// Source file for environment config
    #[serde(default)]
    pub environment_source: Option<String>,

    #[serde(default)]
    pub environments: Option<Environments>,
}

impl AppConfig {
    /// Name used in log lines; apps may omit `name`.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.root
        } else {
            &self.name
        }
    }
}

fn default_root() -> String {
    "src".to_string()
}

fn default_out_dir() -> String {
    "dist".to_string()
}

fn default_index() -> String {
    "index.html".to_string()
}

fn default_polyfills() -> String {
    "polyfills.ts".to_string()
}

fn default_tsconfig() -> String {
    "tsconfig.app.json".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Browser,
    Server,
}

/// An asset is either a path relative to the app root or a glob object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetEntry {
    Path(String),
    Glob {
        /// The pattern to match
        glob: String,
        /// The dir to search within
        input: String,
        /// The output path, relative to the output directory
        output: String,
    },
}

/// A global style or script
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraEntry {
    Path(String),
    Detailed {
        input: String,
        #[serde(default)]
        output: Option<String>,
        #[serde(default)]
        lazy: bool,
    },
}

impl ExtraEntry {
    pub fn input(&self) -> &str {
        match self {
            ExtraEntry::Path(input) => input,
            ExtraEntry::Detailed { input, .. } => input,
        }
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            ExtraEntry::Path(_) => None,
            ExtraEntry::Detailed { output, .. } => output.as_deref(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, ExtraEntry::Detailed { lazy: true, .. })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePreprocessorOptions {
    /// Paths to include, resolved against the app root
    #[serde(default)]
    pub include_paths: Vec<String>,
}

/// Environment files swapped in for `environmentSource`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environments {
    pub prod: String,
    pub dev: String,
}

/// `test` section of the project config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSection {
    #[serde(default)]
    pub karma: ToolConfigRef,
}

/// `e2e` section of the project config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct E2eSection {
    #[serde(default)]
    pub protractor: ToolConfigRef,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfigRef {
    #[serde(default)]
    pub config: Option<PathBuf>,
}

/// Commands used to reach the external tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolingConfig {
    #[serde(default)]
    pub bundler: Option<Vec<String>>,

    #[serde(default)]
    pub karma: Option<Vec<String>>,

    #[serde(default)]
    pub protractor: Option<Vec<String>>,

    #[serde(default)]
    pub webdriver_manager: Option<Vec<String>>,
}
