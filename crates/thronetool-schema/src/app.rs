use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which of the two supported clients an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppIdentity {
    Throne,
    NekoRay,
}

impl AppIdentity {
    pub const ALL: [AppIdentity; 2] = [AppIdentity::Throne, AppIdentity::NekoRay];

    /// Lowercase name used on the command line, in archive names, and as the
    /// distribution package name.
    pub fn slug(self) -> &'static str {
        match self {
            AppIdentity::Throne => "throne",
            AppIdentity::NekoRay => "nekoray",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AppIdentity::Throne => "Throne",
            AppIdentity::NekoRay => "NekoRay",
        }
    }

    /// Only Throne is still published upstream.
    pub fn has_upstream_releases(self) -> bool {
        matches!(self, AppIdentity::Throne)
    }
}

impl fmt::Display for AppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for AppIdentity {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "throne" => Ok(AppIdentity::Throne),
            "nekoray" => Ok(AppIdentity::NekoRay),
            _ => Err(SchemaError::UnknownApp(s.to_owned())),
        }
    }
}
