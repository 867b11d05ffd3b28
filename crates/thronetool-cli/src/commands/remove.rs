use super::Context;
use thronetool_schema::AppIdentity;

pub fn run(ctx: &Context, app: AppIdentity) -> Result<u8, String> {
    ctx.run_operation(&format!("removing {app}..."), |orch| orch.remove(app))
}
