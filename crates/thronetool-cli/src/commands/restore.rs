use super::Context;
use std::path::Path;
use thronetool_schema::AppIdentity;

pub fn run(ctx: &Context, app: AppIdentity, archive: &Path) -> Result<u8, String> {
    ctx.run_operation(&format!("restoring {app} config..."), |orch| {
        orch.restore(app, archive)
    })
}
