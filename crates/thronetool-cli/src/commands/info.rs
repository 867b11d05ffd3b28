use super::{colorize_state, json_pretty, report_error, Context, EXIT_SUCCESS};
use thronetool_schema::AppIdentity;

pub fn run(ctx: &Context, app: AppIdentity) -> Result<u8, String> {
    let info = match ctx.orchestrator().and_then(|orch| orch.info(app)) {
        Ok(info) => info,
        Err(e) => return report_error(&e, ctx.json),
    };
    if ctx.json {
        println!("{}", json_pretty(&info)?);
    } else {
        println!("app:          {} ({})", info.app, info.app.display_name());
        println!("platform:     {}", info.platform);
        println!("state:        {}", colorize_state(info.state));
        println!(
            "version:      {}",
            info.version.as_deref().unwrap_or("(unknown)")
        );
        println!("install_dir:  {}", info.install_dir.display());
        println!("config_dir:   {}", info.config_dir.display());
        println!("executable:   {}", info.executable.display());
    }
    Ok(EXIT_SUCCESS)
}
