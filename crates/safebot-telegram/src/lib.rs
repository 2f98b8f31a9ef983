//! Telegram adapter (teloxide).
//!
//! Wraps incoming Telegram updates as events that can answer their chat, and routes them to
//! guarded handlers.

use async_trait::async_trait;

use teloxide::{prelude::*, types::CallbackQuery};

pub mod handlers;
pub mod router;

use safebot_core::{errors::Error, notify::Notifiable, Result};

fn map_err(e: teloxide::RequestError) -> Error {
    Error::External(format!("telegram error: {e}"))
}

/// An incoming chat message the handlers can read and answer.
pub trait ChatEvent: Notifiable {
    fn chat_id(&self) -> i64;
    fn user_id(&self) -> Option<i64>;
    fn text(&self) -> Option<&str>;
}

/// An incoming message together with the bot that received it.
#[derive(Clone, Debug)]
pub struct TelegramEvent {
    pub bot: Bot,
    pub msg: Message,
}

impl TelegramEvent {
    pub fn new(bot: Bot, msg: Message) -> Self {
        Self { bot, msg }
    }
}

impl ChatEvent for TelegramEvent {
    fn chat_id(&self) -> i64 {
        self.msg.chat.id.0
    }

    fn user_id(&self) -> Option<i64> {
        self.msg.from().map(|u| u.id.0 as i64)
    }

    fn text(&self) -> Option<&str> {
        self.msg.text()
    }
}

#[async_trait]
impl Notifiable for TelegramEvent {
    async fn respond(&self, text: &str) -> Result<()> {
        self.bot
            .send_message(self.msg.chat.id, text.to_string())
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

/// A callback query (inline button press).
#[derive(Clone, Debug)]
pub struct CallbackEvent {
    pub bot: Bot,
    pub query: CallbackQuery,
}

impl CallbackEvent {
    pub fn new(bot: Bot, query: CallbackQuery) -> Self {
        Self { bot, query }
    }

    pub fn user_id(&self) -> i64 {
        self.query.from.id.0 as i64
    }

    pub fn data(&self) -> &str {
        self.query.data.as_deref().unwrap_or("")
    }

    pub async fn answer(&self, text: Option<&str>) -> Result<()> {
        let mut req = self.bot.answer_callback_query(self.query.id.clone());
        if let Some(t) = text {
            req = req.text(t.to_string());
        }
        req.await.map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl Notifiable for CallbackEvent {
    /// Post into the chat the button lives in; without one, answer the query instead.
    async fn respond(&self, text: &str) -> Result<()> {
        match self.query.message.as_ref() {
            Some(msg) => {
                self.bot
                    .send_message(msg.chat.id, text.to_string())
                    .await
                    .map_err(map_err)?;
                Ok(())
            }
            None => self.answer(Some(text)).await,
        }
    }
}
