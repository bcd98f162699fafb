use slack_command_core::{
    Attachment, BoxError, Field, HandlerResult, SlackAction, SlackCommand, SlackResponse,
};
use tracing::info;

pub async fn ping(_command: SlackCommand) -> HandlerResult {
    Ok(Some(SlackResponse::ephemeral("pong")))
}

/// `/echo <text>` repeats the text in channel, with who said it.
pub async fn echo(command: SlackCommand) -> HandlerResult {
    let text = command.text.trim();
    if text.is_empty() {
        return Ok(Some(SlackResponse::ephemeral("Usage: /echo <text>")));
    }

    let response = SlackResponse::in_channel(text).with_attachment(Attachment {
        fallback: format!("{} said {}", command.user_name, text),
        fields: vec![
            Field {
                title: "User".to_string(),
                value: command.user_name.clone(),
                short: true,
            },
            Field {
                title: "Channel".to_string(),
                value: command.channel_name.clone(),
                short: true,
            },
        ],
        ..Attachment::default()
    });

    Ok(Some(response))
}

pub async fn approve(action: SlackAction) -> Result<(), BoxError> {
    let choice = action
        .actions
        .first()
        .map(|item| item.value.as_str())
        .unwrap_or_default();

    info!(
        user_id = %action.user.id,
        callback_id = %action.callback_id,
        choice,
        "approval action received"
    );
    Ok(())
}
