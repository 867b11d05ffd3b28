use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_RELEASE_URL: &str =
    "https://api.github.com/repos/throneproj/Throne/releases/latest";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "THRONETOOL_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Where `backup` writes when no `--output` is given. Defaults to the
    /// current directory.
    pub backup_dir: Option<PathBuf>,
    pub release_url: String,
    pub http_timeout_secs: u64,
    pub hotspot: HotspotSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HotspotSettings {
    pub ssid: String,
    /// Tun interface created by the client's Tun mode.
    pub tun_iface: String,
    /// nftables table owned by throne-tool.
    pub nft_table: String,
    /// `inet` table that must exist before NAT rules are installed.
    pub required_inet_table: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            backup_dir: None,
            release_url: DEFAULT_RELEASE_URL.to_owned(),
            http_timeout_secs: 15,
            hotspot: HotspotSettings::default(),
        }
    }
}

impl Default for HotspotSettings {
    fn default() -> Self {
        Self {
            ssid: "thronetools".to_owned(),
            tun_iface: "nekoray-tun".to_owned(),
            nft_table: "throne_hotspot".to_owned(),
            required_inet_table: "sing-box".to_owned(),
        }
    }
}

impl ToolConfig {
    /// Load from an explicit path, else `$THRONETOOL_CONFIG`, else
    /// `~/.config/thronetool/config.toml`. A missing file yields defaults.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self, SchemaError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SchemaError::Config(format!("invalid {}: {e}", path.display())))?;
        if config.http_timeout_secs == 0 {
            return Err(SchemaError::Config(
                "http_timeout_secs must be greater than zero".to_owned(),
            ));
        }
        debug!("loaded config from {}", path.display());
        Ok(config)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        if !p.is_empty() {
            return Some(PathBuf::from(p));
        }
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()?;
    Some(PathBuf::from(home).join(".config/thronetool/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_constants() {
        let c = ToolConfig::default();
        assert_eq!(c.release_url, DEFAULT_RELEASE_URL);
        assert_eq!(c.http_timeout_secs, 15);
        assert_eq!(c.hotspot.ssid, "thronetools");
        assert_eq!(c.hotspot.tun_iface, "nekoray-tun");
        assert_eq!(c.hotspot.nft_table, "throne_hotspot");
        assert_eq!(c.hotspot.required_inet_table, "sing-box");
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = ToolConfig::default();
        config.backup_dir = Some(PathBuf::from("/var/backups/throne"));
        config.hotspot.ssid = "lab".to_owned();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = ToolConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "http_timeout_secs = 30\n[hotspot]\nssid = \"cafe\"\n").unwrap();

        let c = ToolConfig::load(&path).unwrap();
        assert_eq!(c.http_timeout_secs, 30);
        assert_eq!(c.hotspot.ssid, "cafe");
        assert_eq!(c.hotspot.nft_table, "throne_hotspot");
        assert_eq!(c.release_url, DEFAULT_RELEASE_URL);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "relase_url = \"typo\"\n").unwrap();
        let err = ToolConfig::load(&path).unwrap_err();
        assert!(matches!(err, SchemaError::Config(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "http_timeout_secs = 0\n").unwrap();
        assert!(ToolConfig::load(&path).is_err());
    }

    #[test]
    fn missing_explicit_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = ToolConfig::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(c, ToolConfig::default());
    }
}
