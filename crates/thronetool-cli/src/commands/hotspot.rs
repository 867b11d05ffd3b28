use super::{json_pretty, report_error, Context, EXIT_SUCCESS};
use std::io::IsTerminal;
use thronetool_core::CoreError;
use thronetool_runtime::{HotspotController, HotspotReport, HotspotRequest, SystemShell};
use thronetool_schema::Platform;

/// Stand-in password for dry runs without a terminal; never sent anywhere.
const DRY_RUN_PASSWORD: &str = "dry-run-password";

pub struct EnableArgs {
    pub iface: Option<String>,
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub dry_run: bool,
}

fn controller(ctx: &Context) -> Result<HotspotController<SystemShell>, CoreError> {
    let platform = Platform::current()?;
    Ok(HotspotController::new(
        platform,
        ctx.config.hotspot.clone(),
        SystemShell,
    ))
}

fn read_password(given: Option<String>, dry_run: bool) -> Result<String, String> {
    if let Some(p) = given {
        return Ok(p);
    }
    if std::io::stdin().is_terminal() {
        return dialoguer::Password::new()
            .with_prompt("Hotspot password (min 8 chars)")
            .interact()
            .map_err(|e| format!("failed to read password: {e}"));
    }
    if dry_run {
        return Ok(DRY_RUN_PASSWORD.to_owned());
    }
    Err("no --password given and stdin is not a terminal".to_owned())
}

pub fn enable(ctx: &Context, args: EnableArgs) -> Result<u8, String> {
    let controller = match controller(ctx) {
        Ok(c) => c,
        Err(e) => return report_error(&e, ctx.json),
    };
    let request = HotspotRequest {
        iface: args.iface,
        ssid: args.ssid,
        password: read_password(args.password, args.dry_run)?,
        dry_run: args.dry_run,
    };
    match controller.enable(&request) {
        Ok(report) => print_report(&report, "hotspot enabled", ctx.json),
        Err(e) => report_error(&e.into(), ctx.json),
    }
}

pub fn disable(ctx: &Context, dry_run: bool) -> Result<u8, String> {
    let controller = match controller(ctx) {
        Ok(c) => c,
        Err(e) => return report_error(&e, ctx.json),
    };
    match controller.disable(dry_run) {
        Ok(report) => print_report(&report, "hotspot disabled", ctx.json),
        Err(e) => report_error(&e.into(), ctx.json),
    }
}

fn print_report(report: &HotspotReport, done: &str, json: bool) -> Result<u8, String> {
    if json {
        println!("{}", json_pretty(report)?);
        return Ok(EXIT_SUCCESS);
    }
    if report.dry_run {
        println!("would run:");
        for cmd in &report.commands {
            println!("  {cmd}");
        }
    } else {
        match (&report.ssid, &report.iface) {
            (Some(ssid), Some(iface)) => println!("{done}: SSID {ssid} on {iface}"),
            (Some(ssid), None) => println!("{done}: SSID {ssid}"),
            _ => println!("{done}"),
        }
    }
    for note in &report.notes {
        println!("note: {note}");
    }
    Ok(EXIT_SUCCESS)
}
