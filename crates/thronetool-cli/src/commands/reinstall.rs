use super::Context;
use thronetool_core::ReinstallOptions;
use thronetool_schema::AppIdentity;

pub fn run(ctx: &Context, app: AppIdentity, opts: &ReinstallOptions) -> Result<u8, String> {
    let progress = if opts.backup {
        format!("reinstalling {app} (keeping config)...")
    } else {
        format!("reinstalling {app}...")
    };
    ctx.run_operation(&progress, |orch| orch.reinstall(app, opts))
}
