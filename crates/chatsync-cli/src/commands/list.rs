use chatsync_core::store::LocalStore;
use chatsync_core::LocalMessage;

use crate::commands::common::{format_message_lines, message_to_list_item, Context, MessageListItem};
use crate::error::CliError;

pub async fn list_messages(
    limit: usize,
    pending_only: bool,
    context: &Context,
) -> Result<Vec<LocalMessage>, CliError> {
    let store = context.open_local().await?;
    let messages = if pending_only {
        let mut pending = store.read_unsynced().await?;
        pending.reverse();
        pending
    } else {
        store.read_all().await?
    };
    Ok(messages.into_iter().take(limit).collect())
}

pub async fn run_list(
    limit: usize,
    pending_only: bool,
    as_json: bool,
    context: &Context,
) -> Result<(), CliError> {
    let messages = list_messages(limit, pending_only, context).await?;

    if as_json {
        let json_items = messages
            .iter()
            .map(message_to_list_item)
            .collect::<Vec<MessageListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if messages.is_empty() {
        println!("No messages.");
    } else {
        for line in format_message_lines(&messages) {
            println!("{line}");
        }
    }

    Ok(())
}
