use super::Context;
use std::path::Path;
use thronetool_schema::AppIdentity;

pub fn run(ctx: &Context, app: AppIdentity, output: Option<&Path>) -> Result<u8, String> {
    ctx.run_operation(&format!("backing up {app} config..."), |orch| {
        orch.backup(app, output)
    })
}
