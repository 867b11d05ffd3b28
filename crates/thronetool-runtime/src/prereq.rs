use crate::command::command_exists;
use crate::hotspot::AIRPORT_TOOL;
use std::fmt;
use std::path::Path;
use thronetool_schema::Platform;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

/// Check the tools the native adapter needs to install and remove apps.
pub fn check_install_prereqs(platform: Platform) -> Vec<MissingPrereq> {
    install_prereqs(platform, command_exists)
}

pub(crate) fn install_prereqs(
    platform: Platform,
    exists: impl Fn(&str) -> bool,
) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    match platform {
        Platform::Linux => {
            if !exists("dpkg") && !exists("rpm") {
                missing.push(MissingPrereq {
                    name: "dpkg or rpm",
                    purpose: "installing the Throne package",
                    install_hint: "use a Debian- or Red Hat-based distribution",
                });
            }
            if !exists("sudo") {
                missing.push(MissingPrereq {
                    name: "sudo",
                    purpose: "system-wide package installation",
                    install_hint: "apt install sudo | dnf install sudo",
                });
            }
        }
        Platform::MacOs => {
            if !exists("ditto") {
                missing.push(MissingPrereq {
                    name: "ditto",
                    purpose: "unpacking the app bundle",
                    install_hint: "part of macOS (check PATH)",
                });
            }
        }
        Platform::Windows => {
            if !exists("powershell") {
                missing.push(MissingPrereq {
                    name: "powershell",
                    purpose: "reading the installed version",
                    install_hint: "part of Windows (check PATH)",
                });
            }
        }
    }
    missing
}

/// Check the tools `hotspot enable` and `hotspot disable` drive.
/// Windows has no hotspot support, so nothing is reported there.
pub fn check_hotspot_prereqs(platform: Platform) -> Vec<MissingPrereq> {
    hotspot_prereqs(platform, command_exists, Path::exists)
}

pub(crate) fn hotspot_prereqs(
    platform: Platform,
    exists: impl Fn(&str) -> bool,
    path_exists: impl Fn(&Path) -> bool,
) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    match platform {
        Platform::Linux => {
            if !exists("nmcli") {
                missing.push(MissingPrereq {
                    name: "nmcli",
                    purpose: "creating the Wi-Fi hotspot",
                    install_hint: "apt install network-manager | dnf install NetworkManager | pacman -S networkmanager",
                });
            }
            if !exists("iw") {
                missing.push(MissingPrereq {
                    name: "iw",
                    purpose: "detecting access-point mode",
                    install_hint: "apt install iw | dnf install iw | pacman -S iw",
                });
            }
            if !exists("nft") {
                missing.push(MissingPrereq {
                    name: "nft",
                    purpose: "routing hotspot clients through the tun interface",
                    install_hint: "apt install nftables | dnf install nftables | pacman -S nftables",
                });
            }
        }
        Platform::MacOs => {
            if !exists("networksetup") {
                missing.push(MissingPrereq {
                    name: "networksetup",
                    purpose: "powering the Wi-Fi interface",
                    install_hint: "part of macOS (check PATH)",
                });
            }
            if !path_exists(Path::new(AIRPORT_TOOL)) {
                missing.push(MissingPrereq {
                    name: "airport",
                    purpose: "creating the Wi-Fi network",
                    install_hint: "removed in recent macOS releases; use System Settings > Sharing",
                });
            }
        }
        Platform::Windows => {}
    }
    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nthrone-tool requires these tools for this operation.");
    msg
}
