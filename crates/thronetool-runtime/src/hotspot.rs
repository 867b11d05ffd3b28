//! Wi-Fi hotspot that routes its clients through the proxy's tun interface.
//!
//! On Linux the hotspot is created by NetworkManager and a private nftables
//! table masquerades hotspot traffic out of the tun device created by the
//! client's Tun mode. macOS support is best-effort and relies on the
//! deprecated `airport` tool and the Internet Sharing daemon.

use crate::command::{command_exists, CommandSpec};
use crate::prereq::{format_missing, hotspot_prereqs};
use crate::RuntimeError;
use serde::Serialize;
use std::path::Path;
use thronetool_schema::{HotspotSettings, Platform};
use tracing::{info, warn};

pub const AIRPORT_TOOL: &str =
    "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport";
pub const INTERNET_SHARING_PLIST: &str =
    "/System/Library/LaunchDaemons/com.apple.InternetSharing.plist";
/// Connection name NetworkManager gives `nmcli dev wifi hotspot`.
pub const HOTSPOT_CONNECTION: &str = "Hotspot";
pub const MIN_PASSWORD_LEN: usize = 8;

/// The side-effecting host operations the controller needs.
pub trait HostShell {
    /// Stdout of a successful read-only probe. Runs even in dry-run mode.
    fn capture(&self, cmd: &CommandSpec) -> Option<String>;

    fn run(&self, cmd: &CommandSpec) -> Result<(), RuntimeError>;

    fn command_exists(&self, name: &str) -> bool;

    fn path_exists(&self, path: &Path) -> bool;
}

pub struct SystemShell;

impl HostShell for SystemShell {
    fn capture(&self, cmd: &CommandSpec) -> Option<String> {
        cmd.capture()
    }

    fn run(&self, cmd: &CommandSpec) -> Result<(), RuntimeError> {
        cmd.run().map(|_| ())
    }

    fn command_exists(&self, name: &str) -> bool {
        command_exists(name)
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotspotRequest {
    pub iface: Option<String>,
    pub ssid: Option<String>,
    pub password: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HotspotReport {
    pub iface: Option<String>,
    pub ssid: Option<String>,
    pub dry_run: bool,
    /// Mutating commands in execution order, secrets masked.
    pub commands: Vec<String>,
    pub notes: Vec<String>,
}

pub struct HotspotController<S: HostShell> {
    platform: Platform,
    settings: HotspotSettings,
    shell: S,
}

impl<S: HostShell> HotspotController<S> {
    pub fn new(platform: Platform, settings: HotspotSettings, shell: S) -> Self {
        Self {
            platform,
            settings,
            shell,
        }
    }

    pub fn enable(&self, req: &HotspotRequest) -> Result<HotspotReport, RuntimeError> {
        if !self.platform.supports_hotspot() {
            return Err(RuntimeError::HotspotUnsupported(self.platform));
        }
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RuntimeError::Hotspot(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        self.check_prereqs()?;
        let mut report = HotspotReport {
            ssid: Some(req.ssid.clone().unwrap_or_else(|| self.settings.ssid.clone())),
            dry_run: req.dry_run,
            ..HotspotReport::default()
        };
        match self.platform {
            Platform::Linux => self.enable_linux(req, &mut report)?,
            _ => self.enable_macos(req, &mut report)?,
        }
        Ok(report)
    }

    pub fn disable(&self, dry_run: bool) -> Result<HotspotReport, RuntimeError> {
        if !self.platform.supports_hotspot() {
            return Err(RuntimeError::HotspotUnsupported(self.platform));
        }
        let mut report = HotspotReport {
            dry_run,
            ..HotspotReport::default()
        };
        if self.platform == Platform::Linux {
            self.execute(
                &mut report,
                CommandSpec::new("nmcli")
                    .args(["connection", "down", HOTSPOT_CONNECTION])
                    .allow_failure(),
            )?;
            self.execute(
                &mut report,
                CommandSpec::new("nmcli")
                    .args(["connection", "delete", HOTSPOT_CONNECTION])
                    .allow_failure(),
            )?;
            self.execute(&mut report, self.nft(["delete", "table", "ip"]).allow_failure())?;
        } else if self.shell.path_exists(Path::new(INTERNET_SHARING_PLIST)) {
            self.execute(
                &mut report,
                CommandSpec::sudo("launchctl")
                    .args(["unload", "-w", INTERNET_SHARING_PLIST])
                    .allow_failure(),
            )?;
        } else {
            report
                .notes
                .push("Internet Sharing daemon not found; nothing to stop".to_owned());
        }
        Ok(report)
    }

    fn check_prereqs(&self) -> Result<(), RuntimeError> {
        let missing = hotspot_prereqs(
            self.platform,
            |c| self.shell.command_exists(c),
            |p| self.shell.path_exists(p),
        );
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::MissingPrereqs(format_missing(&missing)))
        }
    }

    fn execute(&self, report: &mut HotspotReport, cmd: CommandSpec) -> Result<(), RuntimeError> {
        report.commands.push(cmd.display());
        if report.dry_run {
            return Ok(());
        }
        self.shell.run(&cmd)
    }

    /// `sudo nft <prefix> <table> [rest...]` on the owned table.
    fn nft<const N: usize>(&self, prefix: [&str; N]) -> CommandSpec {
        CommandSpec::sudo("nft")
            .args(prefix)
            .arg(self.settings.nft_table.clone())
    }

    fn enable_linux(&self, req: &HotspotRequest, report: &mut HotspotReport) -> Result<(), RuntimeError> {
        let iface = self.linux_wifi_iface(req.iface.as_deref())?;
        report.iface = Some(iface.clone());

        let inet = CommandSpec::sudo("nft").args([
            "list",
            "table",
            "inet",
            self.settings.required_inet_table.as_str(),
        ]);
        if self.shell.capture(&inet).is_none() {
            return Err(RuntimeError::Hotspot(format!(
                "nftables table 'inet {}' not found; enable Tun Mode in Throne or NekoRay first",
                self.settings.required_inet_table
            )));
        }

        self.execute(
            report,
            CommandSpec::new("nmcli")
                .args(["radio", "wifi", "on"])
                .allow_failure(),
        )?;

        let info = self
            .shell
            .capture(&CommandSpec::new("iw").args(["dev", iface.as_str(), "info"]));
        if info.is_some_and(|i| i.contains("type AP")) {
            warn!("a hotspot is already active on {iface}");
            report
                .notes
                .push(format!("a hotspot is already active on {iface}; creation skipped"));
            return Ok(());
        }

        let ssid = report.ssid.clone().unwrap_or_default();
        self.execute(
            report,
            CommandSpec::new("nmcli")
                .args(["dev", "wifi", "hotspot", "ifname", iface.as_str(), "ssid", ssid.as_str(), "password"])
                .secret_arg(req.password.clone()),
        )
        .map_err(|e| {
            RuntimeError::Hotspot(format!(
                "failed to start hotspot on {iface} (AP mode may be unsupported): {e}"
            ))
        })?;

        for cmd in self.nat_rules(&iface) {
            self.execute(report, cmd)?;
        }
        info!("hotspot {ssid} running on {iface}");
        Ok(())
    }

    /// The owned table is recreated from scratch on every enable.
    fn nat_rules(&self, iface: &str) -> Vec<CommandSpec> {
        let tun = &self.settings.tun_iface;
        vec![
            self.nft(["delete", "table", "ip"]).allow_failure(),
            self.nft(["add", "table", "ip"]).allow_failure(),
            self.nft(["add", "chain", "ip"])
                .args([
                    "postrouting",
                    "{ type nat hook postrouting priority srcnat; policy accept; }",
                ])
                .allow_failure(),
            self.nft(["add", "rule", "ip"])
                .args(["postrouting", "oifname", tun.as_str(), "masquerade"])
                .allow_failure(),
            self.nft(["add", "chain", "ip"])
                .args([
                    "forward",
                    "{ type filter hook forward priority filter; policy accept; }",
                ])
                .allow_failure(),
            self.nft(["add", "rule", "ip"])
                .args(["forward", "iifname", iface, "oifname", tun.as_str(), "accept"])
                .allow_failure(),
            self.nft(["add", "rule", "ip"])
                .args([
                    "forward",
                    "iifname",
                    tun.as_str(),
                    "oifname",
                    iface,
                    "ct",
                    "state",
                    "established,related",
                    "accept",
                ])
                .allow_failure(),
        ]
    }

    fn linux_wifi_iface(&self, requested: Option<&str>) -> Result<String, RuntimeError> {
        match requested {
            None => self
                .shell
                .capture(&CommandSpec::new("nmcli").args(["device", "status"]))
                .and_then(|out| {
                    out.lines().find_map(|line| {
                        let mut cols = line.split_whitespace();
                        let device = cols.next()?;
                        (cols.next() == Some("wifi")).then(|| device.to_owned())
                    })
                })
                .ok_or_else(|| RuntimeError::Hotspot("no Wi-Fi interface found".to_owned())),
            Some(wanted) => self
                .shell
                .capture(&CommandSpec::new("nmcli").args(["-t", "-f", "DEVICE,TYPE", "device"]))
                .and_then(|out| {
                    out.lines().find_map(|line| {
                        let (device, kind) = line.split_once(':')?;
                        (device == wanted && kind == "wifi").then(|| device.to_owned())
                    })
                })
                .ok_or_else(|| RuntimeError::Hotspot(format!("Wi-Fi interface not found: {wanted}"))),
        }
    }

    fn enable_macos(&self, req: &HotspotRequest, report: &mut HotspotReport) -> Result<(), RuntimeError> {
        let iface = match &req.iface {
            Some(i) => i.clone(),
            None => self.macos_wifi_iface().ok_or_else(|| {
                RuntimeError::Hotspot("Wi-Fi interface not found".to_owned())
            })?,
        };
        report.iface = Some(iface.clone());
        let ssid = report.ssid.clone().unwrap_or_default();

        self.execute(
            report,
            CommandSpec::new("networksetup")
                .args(["-setairportpower", iface.as_str(), "on"])
                .allow_failure(),
        )?;
        let create = CommandSpec::new(AIRPORT_TOOL)
            .args(["--create", ssid.as_str()])
            .secret_arg(req.password.clone());
        if let Err(e) = self.execute(report, create) {
            warn!("airport could not create the network: {e}");
            report.notes.push(
                "creating the network failed; macOS may require manual setup in System Settings > Sharing"
                    .to_owned(),
            );
        }
        if self.shell.path_exists(Path::new(INTERNET_SHARING_PLIST)) {
            self.execute(
                report,
                CommandSpec::sudo("launchctl")
                    .args(["load", "-w", INTERNET_SHARING_PLIST])
                    .allow_failure(),
            )?;
        } else {
            report
                .notes
                .push("Internet Sharing daemon not found; enable sharing manually".to_owned());
        }
        Ok(())
    }

    fn macos_wifi_iface(&self) -> Option<String> {
        let out = self
            .shell
            .capture(&CommandSpec::new("networksetup").arg("-listallhardwareports"))?;
        let lines: Vec<&str> = out.lines().collect();
        lines.iter().enumerate().find_map(|(i, line)| {
            let port = line.strip_prefix("Hardware Port:")?.trim().to_ascii_lowercase();
            if port != "wi-fi" && port != "airport" {
                return None;
            }
            lines
                .iter()
                .skip(i + 1)
                .take(2)
                .find_map(|l| l.strip_prefix("Device:"))
                .map(|d| d.trim().to_owned())
        })
    }
}
