//! Telegram update handlers.
//!
//! The dispatcher endpoints below only wrap the update into an event and run the real handler
//! through a `SafeEventHandler`, so every endpoint returns `Ok` whatever the handler does.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use safebot_core::{notify::Notifiable, safe_event_handler};

use crate::router::AppState;
use crate::{CallbackEvent, ChatEvent, TelegramEvent};

mod callback;
mod commands;
mod text;

const UNAUTHORIZED: &str = "Unauthorized. Contact the bot owner for access.";
const UNSUPPORTED: &str = "Only text messages are supported.";

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    dispatch_message(Arc::new(TelegramEvent::new(bot, msg)), state).await;
    Ok(())
}

/// Run `route_message` under the guard and count the outcome.
async fn dispatch_message<E: ChatEvent + 'static>(event: Arc<E>, state: Arc<AppState>) {
    let outcome = safe_event_handler!(route_message)
        .call((event, state.clone()))
        .await;
    state.stats.record(&outcome);
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let event = Arc::new(CallbackEvent::new(bot, q));
    let outcome = safe_event_handler!(callback::handle_callback)
        .call((event, state.clone()))
        .await;
    state.stats.record(&outcome);
    Ok(())
}

async fn route_message<E: ChatEvent>(
    (event, state): (Arc<E>, Arc<AppState>),
) -> anyhow::Result<()> {
    if !state.cfg.is_authorized(event.user_id()) {
        event.respond(UNAUTHORIZED).await?;
        return Ok(());
    }

    match event.text() {
        Some(text) if text.starts_with('/') => {
            commands::handle_command(event.as_ref(), &state, text).await
        }
        Some(text) => text::handle_text(event.as_ref(), text).await,
        None => {
            event.respond(UNSUPPORTED).await?;
            Ok(())
        }
    }
}
