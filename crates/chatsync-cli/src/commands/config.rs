use serde::Serialize;

use crate::commands::common::Context;
use crate::error::CliError;

#[derive(Serialize)]
struct ResolvedConfig<'a> {
    database: String,
    #[serde(flatten)]
    settings: &'a chatsync_core::SyncSettings,
}

pub fn render_config(context: &Context) -> Result<String, CliError> {
    let resolved = ResolvedConfig {
        database: context.db_path.display().to_string(),
        settings: &context.settings,
    };
    Ok(serde_json::to_string_pretty(&resolved)?)
}

pub fn run_config(context: &Context) -> Result<(), CliError> {
    println!("{}", render_config(context)?);
    Ok(())
}
