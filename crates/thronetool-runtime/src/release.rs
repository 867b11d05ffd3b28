use crate::RuntimeError;
use serde::Deserialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use thronetool_schema::ToolConfig;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Which published artifact a platform installs from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKind {
    Deb,
    Rpm,
    /// `arch` as reported by the host, e.g. `arm64` or `x86_64`.
    MacZip { arch: String },
    WindowsInstaller,
}

impl AssetKind {
    pub fn mac_for_host() -> Self {
        let arch = match std::env::consts::ARCH {
            "aarch64" => "arm64",
            other => other,
        };
        AssetKind::MacZip {
            arch: arch.to_owned(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            AssetKind::Deb => in_order(name, &["Throne", "debian", ".deb"]),
            AssetKind::Rpm => in_order(name, &["Throne", ".el", ".rpm"]),
            AssetKind::MacZip { arch } => {
                in_order(name, &["Throne", &format!("macos-{arch}.zip")])
            }
            AssetKind::WindowsInstaller => {
                let lower = name.to_ascii_lowercase();
                lower.ends_with("installer.exe") && in_order(&lower, &["windows", "installer.exe"])
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AssetKind::Deb => ".deb package".to_owned(),
            AssetKind::Rpm => ".rpm package".to_owned(),
            AssetKind::MacZip { arch } => format!("macOS {arch} zip"),
            AssetKind::WindowsInstaller => "Windows installer".to_owned(),
        }
    }
}

/// True if every needle occurs in `haystack`, each after the previous one.
fn in_order(haystack: &str, needles: &[&str]) -> bool {
    let mut rest = haystack;
    for needle in needles {
        match rest.find(needle) {
            Some(i) => rest = &rest[i + needle.len()..],
            None => return false,
        }
    }
    true
}

impl Release {
    pub fn find(&self, kind: &AssetKind) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| kind.matches(&a.name))
    }

    /// Like [`Release::find`], but a miss is an error that lists what the
    /// release does contain.
    pub fn require(&self, kind: &AssetKind) -> Result<&ReleaseAsset, RuntimeError> {
        self.find(kind).ok_or_else(|| {
            let names: Vec<&str> = self.assets.iter().map(|a| a.name.as_str()).collect();
            RuntimeError::Release(format!(
                "no {} in release {} (available: {})",
                kind.describe(),
                self.tag_name,
                if names.is_empty() {
                    "none".to_owned()
                } else {
                    names.join(", ")
                }
            ))
        })
    }
}

/// Client for the GitHub "latest release" endpoint and its assets.
pub struct ReleaseClient {
    agent: ureq::Agent,
    url: String,
}

impl ReleaseClient {
    pub fn new(url: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            url: url.to_owned(),
        }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(
            &config.release_url,
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn get(&self, url: &str, accept: &str) -> Result<ureq::http::Response<ureq::Body>, RuntimeError> {
        let req = self
            .agent
            .get(url)
            .header("Accept", accept)
            .header(
                "User-Agent",
                &format!("throne-tool/{}", env!("CARGO_PKG_VERSION")),
            );
        match req.call() {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::StatusCode(code)) => {
                Err(RuntimeError::Release(format!("HTTP {code} for {url}")))
            }
            Err(e) => Err(RuntimeError::Release(format!("{url}: {e}"))),
        }
    }

    pub fn latest(&self) -> Result<Release, RuntimeError> {
        debug!("GET {}", self.url);
        let resp = self.get(&self.url, "application/vnd.github+json")?;
        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| RuntimeError::Release(e.to_string()))?;
        parse_release(&body)
    }

    /// Stream `asset` into `dir`, returning the downloaded file's path.
    pub fn download(&self, asset: &ReleaseAsset, dir: &Path) -> Result<PathBuf, RuntimeError> {
        let file_name = Path::new(&asset.name)
            .file_name()
            .filter(|n| n.to_str() == Some(asset.name.as_str()))
            .ok_or_else(|| RuntimeError::Release(format!("unsafe asset name: {}", asset.name)))?
            .to_owned();
        info!("downloading {}", asset.browser_download_url);
        let resp = self.get(&asset.browser_download_url, "application/octet-stream")?;

        let mut reader = resp.into_body().into_reader();
        let mut tmp = NamedTempFile::new_in(dir)?;
        let bytes = io::copy(&mut reader, &mut tmp)
            .map_err(|e| RuntimeError::Release(format!("{}: {e}", asset.browser_download_url)))?;
        tmp.as_file().sync_all()?;
        let dest = dir.join(file_name);
        tmp.persist(&dest).map_err(|e| RuntimeError::Io(e.error))?;
        debug!("downloaded {bytes} bytes to {}", dest.display());
        Ok(dest)
    }
}

pub fn parse_release(body: &[u8]) -> Result<Release, RuntimeError> {
    serde_json::from_slice(body).map_err(|e| RuntimeError::Release(format!("invalid release JSON: {e}")))
}
