use super::Context;
use thronetool_schema::AppIdentity;

pub fn run(ctx: &Context, app: AppIdentity, force: bool) -> Result<u8, String> {
    ctx.run_operation(&format!("installing {app}..."), |orch| {
        orch.install(app, force)
    })
}
