//! Typed bundler plugin list
//!
//! Every variant serializes as `{"plugin": "<ClassName>", ...options}` so
//! the driver can instantiate the matching bundler plugin.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::{BuildTarget, Platform};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "plugin")]
pub enum Plugin {
    #[serde(rename = "LoaderOptionsPlugin")]
    LoaderOptions { debug: bool },

    #[serde(rename = "NoEmitOnErrorsPlugin")]
    NoEmitOnErrors,

    #[serde(rename = "CopyWebpackPlugin")]
    Copy {
        patterns: Vec<CopyPattern>,
        ignore: Vec<String>,
    },

    /// Progress is reported back over the driver protocol
    #[serde(rename = "ProgressPlugin")]
    Progress,

    #[serde(rename = "CircularDependencyPlugin", rename_all = "camelCase")]
    CircularDependency { exclude: String, fail_on_error: bool },

    #[serde(rename = "NamedLazyChunksWebpackPlugin")]
    NamedLazyChunks,

    #[serde(rename = "HtmlWebpackPlugin")]
    Html(HtmlOptions),

    #[serde(rename = "BaseHrefWebpackPlugin", rename_all = "camelCase")]
    BaseHref { base_href: Option<String> },

    #[serde(rename = "CommonsChunkPlugin")]
    CommonsChunk(CommonsChunkOptions),

    #[serde(rename = "SourceMapDevToolPlugin", rename_all = "camelCase")]
    SourceMapDevTool {
        filename: String,
        module_filename_template: String,
        fallback_module_filename_template: String,
        source_root: String,
    },

    #[serde(rename = "EvalSourceMapDevToolPlugin", rename_all = "camelCase")]
    EvalSourceMapDevTool {
        module_filename_template: String,
        source_root: String,
    },

    #[serde(rename = "NamedModulesPlugin")]
    NamedModules,

    #[serde(rename = "ExtractTextPlugin")]
    ExtractText { filename: String },

    #[serde(rename = "SuppressExtractedTextChunksWebpackPlugin")]
    SuppressExtractedTextChunks,

    #[serde(rename = "EnvironmentPlugin")]
    Environment {
        #[serde(rename = "NODE_ENV")]
        node_env: BuildTarget,
    },

    #[serde(rename = "HashedModuleIdsPlugin")]
    HashedModuleIds,

    #[serde(rename = "ModuleConcatenationPlugin")]
    ModuleConcatenation,

    #[serde(rename = "LicenseWebpackPlugin", rename_all = "camelCase")]
    License {
        pattern: String,
        suppress_errors: bool,
        per_chunk_output: bool,
        output_filename: String,
    },

    #[serde(rename = "PurifyPlugin")]
    Purify,

    #[serde(rename = "UglifyJsPlugin", rename_all = "camelCase")]
    UglifyJs {
        source_map: bool,
        uglify_options: serde_json::Value,
    },

    #[serde(rename = "CompressionPlugin", rename_all = "camelCase")]
    Compression {
        test: String,
        threshold: u64,
        min_ratio: f64,
    },

    #[serde(rename = "AngularCompilerPlugin")]
    AngularCompiler(AngularCompilerOptions),

    #[serde(rename = "HotModuleReplacementPlugin")]
    HotModuleReplacement,
}

impl Plugin {
    /// Class name the driver instantiates
    pub fn name(&self) -> &'static str {
        match self {
            Plugin::LoaderOptions { .. } => "LoaderOptionsPlugin",
            Plugin::NoEmitOnErrors => "NoEmitOnErrorsPlugin",
            Plugin::Copy { .. } => "CopyWebpackPlugin",
            Plugin::Progress => "ProgressPlugin",
            Plugin::CircularDependency { .. } => "CircularDependencyPlugin",
            Plugin::NamedLazyChunks => "NamedLazyChunksWebpackPlugin",
            Plugin::Html(_) => "HtmlWebpackPlugin",
            Plugin::BaseHref { .. } => "BaseHrefWebpackPlugin",
            Plugin::CommonsChunk(_) => "CommonsChunkPlugin",
            Plugin::SourceMapDevTool { .. } => "SourceMapDevToolPlugin",
            Plugin::EvalSourceMapDevTool { .. } => "EvalSourceMapDevToolPlugin",
            Plugin::NamedModules => "NamedModulesPlugin",
            Plugin::ExtractText { .. } => "ExtractTextPlugin",
            Plugin::SuppressExtractedTextChunks => "SuppressExtractedTextChunksWebpackPlugin",
            Plugin::Environment { .. } => "EnvironmentPlugin",
            Plugin::HashedModuleIds => "HashedModuleIdsPlugin",
            Plugin::ModuleConcatenation => "ModuleConcatenationPlugin",
            Plugin::License { .. } => "LicenseWebpackPlugin",
            Plugin::Purify => "PurifyPlugin",
            Plugin::UglifyJs { .. } => "UglifyJsPlugin",
            Plugin::Compression { .. } => "CompressionPlugin",
            Plugin::AngularCompiler(_) => "AngularCompilerPlugin",
            Plugin::HotModuleReplacement => "HotModuleReplacementPlugin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyPattern {
    pub context: PathBuf,
    pub to: String,
    pub from: CopyFrom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyFrom {
    pub glob: String,
    pub dot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlOptions {
    pub template: PathBuf,
    pub filename: PathBuf,
    /// `None` disables minification
    pub minify: Option<HtmlMinify>,
    pub exclude_chunks: Vec<String>,
    pub xhtml: bool,
    /// Entry names in the order their chunks are injected
    pub chunks_sort_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlMinify {
    pub case_sensitive: bool,
    pub collapse_whitespace: bool,
    pub keep_closing_slash: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonsChunkOptions {
    pub name: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<String>,

    pub min_chunks: MinChunks,

    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub async_name: Option<String>,

    pub children: bool,
}

/// When a module moves into a commons chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MinChunks {
    /// Never; the chunk only holds the runtime
    Infinity,
    /// Used by at least this many chunks
    Count(u32),
    /// Resolved from one of these module directories
    ModulesUnder(Vec<PathBuf>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AngularCompilerOptions {
    pub main_path: PathBuf,
    pub platform: Platform,
    pub host_replacement_paths: BTreeMap<PathBuf, PathBuf>,
    pub source_map: bool,
    pub ts_config_path: PathBuf,
    pub skip_code_generation: bool,
    pub compiler_options: CompilerOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompilerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unit_plugin_serializes_as_tag_only() {
        let value = serde_json::to_value(Plugin::HotModuleReplacement).unwrap();
        assert_eq!(value, json!({ "plugin": "HotModuleReplacementPlugin" }));
    }

    #[test]
    fn test_struct_plugin_fields_are_camel_case() {
        let plugin = Plugin::CircularDependency {
            exclude: "node_modules".to_string(),
            fail_on_error: false,
        };
        let value = serde_json::to_value(&plugin).unwrap();
        assert_eq!(value["plugin"], "CircularDependencyPlugin");
        assert_eq!(value["failOnError"], false);
        assert_eq!(plugin.name(), "CircularDependencyPlugin");
    }

    #[test]
    fn test_environment_plugin_uses_node_env_key() {
        let value = serde_json::to_value(Plugin::Environment {
            node_env: BuildTarget::Production,
        })
        .unwrap();
        assert_eq!(value["NODE_ENV"], "production");
    }

    #[test]
    fn test_commons_chunk_async_key() {
        let value = serde_json::to_value(Plugin::CommonsChunk(CommonsChunkOptions {
            name: "main".to_string(),
            chunks: vec![],
            min_chunks: MinChunks::Count(2),
            async_name: Some("common".to_string()),
            children: true,
        }))
        .unwrap();
        assert_eq!(value["async"], "common");
        assert_eq!(value["minChunks"], json!({ "count": 2 }));
        assert!(value.get("chunks").is_none());
    }
}
