//! Compilation results reported by the driver

use std::fmt::Write;

use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::utils::format_size;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileStats {
    #[serde(default)]
    pub hash: Option<String>,

    #[serde(default)]
    pub time_ms: u64,

    #[serde(default)]
    pub assets: Vec<AssetStats>,

    #[serde(default)]
    pub warnings: Vec<String>,

    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStats {
    pub name: String,
    pub size: u64,

    #[serde(default)]
    pub chunk_names: Vec<String>,

    #[serde(default)]
    pub emitted: bool,
}

impl CompileStats {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Header line plus one line per asset. Source maps only show up when
    /// `verbose` is set.
    pub fn summary(&self, verbose: bool) -> String {
        let mut out = String::new();
        let hash = self.hash.as_deref().unwrap_or("-");
        let _ = write!(out, "Hash: {} - Time: {}ms", hash.bold(), self.time_ms.to_string().bold());

        for asset in &self.assets {
            if !verbose && asset.name.ends_with(".map") {
                continue;
            }

            let chunks = if asset.chunk_names.is_empty() {
                String::new()
            } else {
                format!("({}) ", asset.chunk_names.join(", "))
            };
            let emitted = if asset.emitted { " [emitted]".green().to_string() } else { String::new() };

            let _ = write!(
                out,
                "\nchunk {}{} {}{}",
                chunks,
                asset.name.cyan(),
                format_size(asset.size).dimmed(),
                emitted
            );
        }

        out
    }

    pub fn warnings_to_string(&self) -> String {
        self.warnings.join("\n\n")
    }

    pub fn errors_to_string(&self) -> String {
        self.errors.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> CompileStats {
        CompileStats {
            hash: Some("3f2a".to_string()),
            time_ms: 1200,
            assets: vec![
                AssetStats {
                    name: "main.bundle.js".to_string(),
                    size: 2048,
                    chunk_names: vec!["main".to_string()],
                    emitted: true,
                },
                AssetStats {
                    name: "main.bundle.js.map".to_string(),
                    size: 4096,
                    chunk_names: vec!["main".to_string()],
                    emitted: true,
                },
            ],
            warnings: vec![],
            errors: vec![],
        }
    }

    #[test]
    fn test_summary_hides_source_maps_unless_verbose() {
        colored::control::set_override(false);
        let stats = stats();

        let short = stats.summary(false);
        assert!(short.starts_with("Hash: 3f2a - Time: 1200ms"));
        assert!(short.contains("main.bundle.js 2.00 KB"));
        assert!(!short.contains(".map"));

        assert!(stats.summary(true).contains("main.bundle.js.map 4.00 KB"));
    }

    #[test]
    fn test_driver_payload_defaults() {
        let stats: CompileStats = serde_json::from_str(r#"{ "errors": ["boom"] }"#).unwrap();
        assert!(stats.has_errors());
        assert!(!stats.has_warnings());
        assert_eq!(stats.time_ms, 0);
    }
}
