use super::{json_pretty, Context, EXIT_FAILURE, EXIT_SUCCESS};
use serde::Serialize;
use thronetool_core::probe;
use thronetool_runtime::{check_hotspot_prereqs, check_install_prereqs, format_missing};
use thronetool_schema::{AppIdentity, PathResolver, Platform};

pub fn run(ctx: &Context) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    match Platform::current() {
        Ok(platform) => {
            checks.push(Check::pass("platform", &format!("Platform: {platform}")));
            check_prereqs(platform, ctx, &mut checks, &mut all_pass);
            check_paths(platform, &mut checks, &mut all_pass);
        }
        Err(e) => {
            all_pass = false;
            checks.push(Check::fail("platform", &e.to_string()));
        }
    }
    checks.push(Check::info(
        "release_url",
        &format!("Release metadata: {}", ctx.config.release_url),
    ));

    print_results(&checks, all_pass, ctx.json)
}

fn check_prereqs(
    platform: Platform,
    ctx: &Context,
    checks: &mut Vec<Check>,
    all_pass: &mut bool,
) {
    if ctx.adapter != "system" {
        checks.push(Check::info(
            "install_prereqs",
            &format!("Using the {} adapter; native tools not required", ctx.adapter),
        ));
    } else {
        let missing = check_install_prereqs(platform);
        if missing.is_empty() {
            checks.push(Check::pass(
                "install_prereqs",
                "Install prerequisites satisfied",
            ));
        } else {
            *all_pass = false;
            checks.push(Check::fail("install_prereqs", &format_missing(&missing)));
        }
    }

    if !platform.supports_hotspot() {
        checks.push(Check::info(
            "hotspot_prereqs",
            &format!("Hotspot is not supported on {platform}"),
        ));
        return;
    }
    let missing = check_hotspot_prereqs(platform);
    if missing.is_empty() {
        checks.push(Check::pass(
            "hotspot_prereqs",
            "Hotspot prerequisites satisfied",
        ));
    } else {
        // Only the hotspot command needs these.
        checks.push(Check::warn("hotspot_prereqs", &format_missing(&missing)));
    }
}

fn check_paths(platform: Platform, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let resolver = match PathResolver::from_env() {
        Ok(r) => r,
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("paths", &e.to_string()));
            return;
        }
    };
    for app in AppIdentity::ALL {
        let name = format!("{app}_paths");
        match resolver.resolve(app, platform) {
            Ok(paths) => checks.push(Check::info(
                &name,
                &format!(
                    "{} is {}: install {}, config {}",
                    app.display_name(),
                    probe(&paths),
                    paths.install_dir.display(),
                    paths.config_dir.display()
                ),
            )),
            Err(e) => {
                *all_pass = false;
                checks.push(Check::fail(&name, &e.to_string()));
            }
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks,
        });
        println!("{}", json_pretty(&json)?);
    } else {
        println!("throne-tool doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

#[derive(Serialize)]
struct Check {
    name: String,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &str, status: &'static str, message: &str) -> Self {
        Self {
            name: name.to_owned(),
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
