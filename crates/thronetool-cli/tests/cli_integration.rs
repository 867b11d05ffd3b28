//! CLI subprocess integration tests.
//!
//! These run the `throne-tool` binary against the mock adapter with every
//! path rooted in a temporary directory, and check exit codes, stdout and
//! JSON output.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn throne_tool(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_throne-tool"));
    cmd.env("THRONETOOL_ROOT", root)
        .env("THRONETOOL_ADAPTER", "mock")
        .env("THRONETOOL_CONFIG", root.join("no-such-config.toml"))
        .env_remove("THRONETOOL_MOCK_FAIL")
        .env_remove("THRONETOOL_LOG");
    cmd
}

fn run(root: &Path, args: &[&str]) -> Output {
    throne_tool(root).args(args).output().unwrap()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "invalid JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn throne_config(root: &Path) -> PathBuf {
    let out = run(root, &["info", "--app", "throne", "--json"]);
    PathBuf::from(json(&out)["config_dir"].as_str().unwrap())
}

#[test]
fn cli_version_exits_zero() {
    let root = tempfile::tempdir().unwrap();
    let output = run(root.path(), &["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("throne-tool"));
}

#[test]
fn cli_help_lists_commands() {
    let root = tempfile::tempdir().unwrap();
    let output = run(root.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["install", "backup", "restore", "remove", "reinstall", "info", "hotspot"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}': {stdout}");
    }
    assert!(!stdout.contains("--adapter"), "adapter flag must stay hidden");
}

#[test]
fn info_on_absent_app_exits_zero() {
    let root = tempfile::tempdir().unwrap();
    let output = run(root.path(), &["info", "--app", "nekoray", "--json"]);
    assert_eq!(output.status.code(), Some(0));
    let v = json(&output);
    assert_eq!(v["state"], "absent");
    assert_eq!(v["app"], "nekoray");
    assert!(v["version"].is_null());
}

#[test]
fn subcommand_help_documents_formats_and_exit_status() {
    let root = tempfile::tempdir().unwrap();
    let restore = run(root.path(), &["restore", "--help"]);
    assert!(String::from_utf8_lossy(&restore.stdout).contains(".tar.gz"));
    let info = run(root.path(), &["info", "--help"]);
    let text = String::from_utf8_lossy(&info.stdout);
    assert!(text.contains("Exits 0"), "{text}");
    assert!(text.contains("cannot be resolved"), "{text}");
}

#[test]
fn restoring_a_zip_names_the_format() {
    let root = tempfile::tempdir().unwrap();
    assert_eq!(run(root.path(), &["install"]).status.code(), Some(0));
    let zip = root.path().join("throne-backup-2026-01-02.zip");
    std::fs::write(&zip, b"PK\x03\x04\x14\x00\x00\x00").unwrap();
    let output = run(
        root.path(),
        &["restore", "--app", "throne", "--zip", zip.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("zip file"));
}

#[test]
fn unknown_app_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let output = run(root.path(), &["info", "--app", "clash"]);
    assert!(!output.status.success());
}

#[test]
fn install_twice_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let first = run(root.path(), &["install", "--json"]);
    assert_eq!(first.status.code(), Some(0));
    assert_eq!(json(&first)["state_after"], "installed");

    let second = run(root.path(), &["install", "--app", "throne", "--json"]);
    assert_eq!(second.status.code(), Some(0));
    let v = json(&second);
    assert_eq!(v["state_before"], "installed");
    assert!(v["message"].as_str().unwrap().contains("already installed"));
}

#[test]
fn backup_of_absent_app_is_a_state_error() {
    let root = tempfile::tempdir().unwrap();
    let output = run(
        root.path(),
        &["backup", "--app", "throne", "--output", root.path().to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nothing to back up"));
}

#[test]
fn failing_adapter_is_a_platform_error() {
    let root = tempfile::tempdir().unwrap();
    let output = throne_tool(root.path())
        .env("THRONETOOL_MOCK_FAIL", "install")
        .args(["install", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let v = json(&output);
    assert_eq!(v["error"], "PlatformAdapter");
    assert_eq!(v["state_after"], "absent");
}

#[test]
fn backup_remove_restore_scenario() {
    let root = tempfile::tempdir().unwrap();
    let backups = root.path().join("backups");
    std::fs::create_dir(&backups).unwrap();

    assert_eq!(run(root.path(), &["install"]).status.code(), Some(0));
    let config = throne_config(root.path());
    std::fs::write(config.join("groups.json"), "{}").unwrap();

    let backup = run(
        root.path(),
        &["backup", "--app", "throne", "--output", backups.to_str().unwrap(), "--json"],
    );
    assert_eq!(backup.status.code(), Some(0));
    let archive = PathBuf::from(json(&backup)["archive"].as_str().unwrap());
    let name = archive.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("throne-backup-") && name.ends_with(".tar.gz"), "{name}");

    assert_eq!(
        run(root.path(), &["remove", "--app", "throne"]).status.code(),
        Some(0)
    );

    let restore = run(
        root.path(),
        &["restore", "--app", "throne", "--zip", archive.to_str().unwrap()],
    );
    assert_eq!(restore.status.code(), Some(2));

    assert_eq!(run(root.path(), &["install"]).status.code(), Some(0));
    let restore = run(
        root.path(),
        &["restore", "--app", "throne", "--archive", archive.to_str().unwrap()],
    );
    assert_eq!(restore.status.code(), Some(0), "{restore:?}");
    assert_eq!(std::fs::read_to_string(config.join("groups.json")).unwrap(), "{}");
}

#[test]
fn restoring_other_apps_archive_is_an_archive_error() {
    let root = tempfile::tempdir().unwrap();
    for app in ["throne", "nekoray"] {
        assert_eq!(
            run(root.path(), &["install", "--app", app]).status.code(),
            Some(0)
        );
    }
    let backup = run(
        root.path(),
        &["backup", "--app", "nekoray", "--output", root.path().to_str().unwrap(), "--json"],
    );
    let archive = json(&backup)["archive"].as_str().unwrap().to_owned();

    let config = throne_config(root.path());
    std::fs::write(config.join("marker"), "throne").unwrap();
    let output = run(
        root.path(),
        &["restore", "--app", "throne", "--zip", &archive, "--json"],
    );
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(json(&output)["error"], "ArchiveMismatch");
    assert_eq!(std::fs::read_to_string(config.join("marker")).unwrap(), "throne");
}

#[test]
fn reinstall_with_backup_keeps_config() {
    let root = tempfile::tempdir().unwrap();
    assert_eq!(run(root.path(), &["install"]).status.code(), Some(0));
    let config = throne_config(root.path());
    std::fs::write(config.join("settings.json"), "keep me").unwrap();

    let out_dir = root.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();
    let output = run(
        root.path(),
        &[
            "reinstall",
            "--app",
            "throne",
            "--backup",
            "--output",
            out_dir.to_str().unwrap(),
            "--json",
        ],
    );
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let v = json(&output);
    let phases: Vec<_> = v["phases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["operation"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(
        phases,
        ["inspect", "backup", "remove", "install", "restore"]
    );
    assert_eq!(
        std::fs::read_to_string(config.join("settings.json")).unwrap(),
        "keep me"
    );
}

#[test]
fn remove_with_remnants_is_a_state_error() {
    let root = tempfile::tempdir().unwrap();
    assert_eq!(run(root.path(), &["install"]).status.code(), Some(0));
    let output = throne_tool(root.path())
        .env("THRONETOOL_MOCK_FAIL", "remnants")
        .args(["remove", "--app", "throne", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let v = json(&output);
    assert_eq!(v["error"], "PartialRemoval");
    assert_eq!(v["recoverable"], false);
}

#[test]
fn completions_generate_for_bash() {
    let root = tempfile::tempdir().unwrap();
    let output = run(root.path(), &["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("throne-tool"));
}

#[test]
fn man_pages_are_written() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("man");
    let output = run(root.path(), &["man-pages", dir.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(dir.join("throne-tool.1").is_file());
    assert!(dir.join("throne-tool-backup.1").is_file());
}

#[cfg(target_os = "linux")]
#[test]
fn hotspot_disable_dry_run_prints_commands() {
    let root = tempfile::tempdir().unwrap();
    let output = run(root.path(), &["hotspot", "disable", "--dry-run", "--json"]);
    assert_eq!(output.status.code(), Some(0));
    let v = json(&output);
    assert_eq!(v["dry_run"], true);
    let commands: Vec<_> = v["commands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap().to_owned())
        .collect();
    assert!(commands.iter().any(|c| c.contains("nmcli connection down Hotspot")));
    assert!(commands.iter().any(|c| c.contains("throne_hotspot")));
}

#[cfg(target_os = "linux")]
#[test]
fn hotspot_rejects_short_password() {
    let root = tempfile::tempdir().unwrap();
    let output = run(
        root.path(),
        &["hotspot", "enable", "--password", "short", "--dry-run"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least 8 characters"));
}
