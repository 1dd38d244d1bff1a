use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::{MediaKind, MessageEntity, MessageEntityKind, MessageKind};
use tracing::{error, info, warn};

use crate::handler::MessageHandler;
use crate::platform::{IncomingMessage, LinkPreview, SpanKind, TextSpan};

/// Run the Telegram bot platform
pub async fn run(handler: Arc<MessageHandler>, bot: Bot) -> Result<()> {
    let me = bot
        .get_me()
        .await
        .context("Failed to get bot info from Telegram")?;
    info!("Bot username: @{}", me.username());

    info!("Starting Telegram platform...");

    let endpoint = Update::filter_message()
        .filter_map(|msg: Message| to_incoming(&msg))
        .endpoint(handle_message);

    Dispatcher::builder(bot, endpoint)
        .dependencies(dptree::deps![handler])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    incoming: IncomingMessage,
    handler: Arc<MessageHandler>,
) -> ResponseResult<()> {
    let reply = handler.handle(&incoming).await;

    if let Err(e) = bot.send_message(msg.chat.id, reply).await {
        error!("Send message error in chat {}: {}", msg.chat.id, e);
    }

    Ok(())
}

/// Convert a Telegram message; messages without a sender are dropped.
fn to_incoming(msg: &Message) -> Option<IncomingMessage> {
    let user = msg.from.as_ref()?;

    let text = msg.text().or_else(|| msg.caption()).unwrap_or_default();
    let entities = msg
        .entities()
        .or_else(|| msg.caption_entities())
        .unwrap_or_default();

    Some(IncomingMessage {
        chat_id: msg.chat.id.0.to_string(),
        username: user.username.clone(),
        text: text.to_string(),
        spans: entities.iter().map(to_span).collect(),
        link_preview: link_preview(msg),
    })
}

fn to_span(entity: &MessageEntity) -> TextSpan {
    match &entity.kind {
        MessageEntityKind::Url => TextSpan::url(entity.offset, entity.length),
        MessageEntityKind::TextLink { url } => {
            TextSpan::text_link(entity.offset, entity.length, url.as_str())
        }
        _ => TextSpan {
            kind: SpanKind::Other,
            offset: entity.offset,
            length: entity.length,
            url: None,
        },
    }
}

fn link_preview(msg: &Message) -> Option<LinkPreview> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };
    let MediaKind::Text(media) = &common.media_kind else {
        return None;
    };
    media
        .link_preview_options
        .as_ref()
        .map(|options| LinkPreview {
            url: options.url.clone(),
            is_disabled: options.is_disabled,
        })
}
