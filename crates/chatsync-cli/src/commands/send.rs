use crate::commands::common::{resolve_message_content, Context};
use crate::error::CliError;

pub async fn run_send(content_parts: &[String], context: &Context) -> Result<(), CliError> {
    let content = resolve_message_content(content_parts)?;

    let repository = context.chat_repository().await?;
    let message = repository.save_user_message(&content).await?;

    if message.is_synced {
        println!("{}", message.id);
    } else {
        println!("{} (pending sync)", message.id);
    }
    Ok(())
}
