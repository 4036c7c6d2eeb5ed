//! Build target guard

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// The two supported build modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    #[default]
    Development,
    Production,
}

impl BuildTarget {
    pub const ALL: [BuildTarget; 2] = [BuildTarget::Development, BuildTarget::Production];

    /// Normalize a requested target.
    ///
    /// Absent or empty input means development; anything that is not one of
    /// the known names is an [`ToolError::InvalidTarget`].
    pub fn ensure(target: Option<&str>) -> Result<Self, ToolError> {
        match target.map(str::trim) {
            None | Some("") => Ok(BuildTarget::Development),
            Some(name) => name.parse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildTarget::Development => "development",
            BuildTarget::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, BuildTarget::Production)
    }
}

impl FromStr for BuildTarget {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|target| target.as_str() == s)
            .ok_or_else(|| ToolError::InvalidTarget {
                given: s.to_string(),
                valid: Self::ALL.iter().map(|t| t.as_str()).collect(),
            })
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
