//! Error types shared by the config loader, the bundle configuration
//! builder and the tasks.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for tooling operations
pub type Result<T, E = ToolError> = std::result::Result<T, E>;

/// Everything that can stop a task
#[derive(Debug, Error)]
pub enum ToolError {
    /// Neither config file name exists in the project root
    #[error("No configuration files found (looked for {})", display_paths(.searched))]
    ConfigNotFound { searched: Vec<PathBuf> },

    /// Config file exists but is not valid JSON for the expected schema
    #[error("Failed to parse {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No app matches the requested name or index
    #[error("Unable to find app with name or index '{selector}'. Please verify the configuration.")]
    AppNotFound { selector: String },

    /// Build target outside the enumeration
    #[error("Invalid target '{given}' was provided. Valid options are '{}'.", .valid.join("', '"))]
    InvalidTarget {
        given: String,
        valid: Vec<&'static str>,
    },

    /// App without a main entry cannot be built or tested
    #[error("An app without 'main' cannot be built (app '{app}').")]
    MissingEntryPoint { app: String },

    /// `test.karma.config` or `e2e.protractor.config` is not set
    #[error("No {tool} config found in config.")]
    MissingToolConfig { tool: &'static str },

    /// Refusing to wipe the project itself
    #[error("Output path MUST not be project root directory! ({})", .path.display())]
    OutputIsProjectRoot { path: PathBuf },

    /// Asset glob that cannot be compiled
    #[error("Invalid asset pattern '{pattern}': {reason}")]
    InvalidAsset { pattern: String, reason: String },

    /// Requested port is taken and is not the default one
    #[error("Port {port} is already in use. Use '--port' to specify a different port.")]
    PortInUse { port: u16 },

    /// External bundler reported errors
    #[error("{0}")]
    CompilationFailed(String),

    /// External tool could not be located, spawned, or exited badly
    #[error("{tool}: {reason}")]
    ExternalToolFailure { tool: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub(crate) fn external(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExternalToolFailure {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
