use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_clear(context: &Context) -> Result<(), CliError> {
    let repository = context.chat_repository().await?;
    repository.clear_history().await?;
    println!("Chat history cleared");
    Ok(())
}
