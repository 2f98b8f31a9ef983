use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use safebot_core::{config::Config, log_info, log_warning};

use crate::handlers;

#[derive(Debug)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub started: Instant,
    pub stats: HandlerStats,
}

impl AppState {
    pub fn new(cfg: Arc<Config>) -> Self {
        Self {
            cfg,
            started: Instant::now(),
            stats: HandlerStats::default(),
        }
    }
}

/// Outcome counters for guarded handlers.
#[derive(Debug, Default)]
pub struct HandlerStats {
    handled: AtomicU64,
    failed: AtomicU64,
}

impl HandlerStats {
    /// Count the result of a guarded call: `None` means the handler failed.
    pub fn record<T>(&self, outcome: &Option<T>) {
        let counter = if outcome.is_some() {
            &self.handled
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => log_info(&format!("safebot started: @{}", me.username())),
        Err(e) => log_warning(&format!("could not fetch bot identity: {e}")),
    }
    if cfg.telegram_allowed_users.is_empty() {
        log_warning("TELEGRAM_ALLOWED_USERS is empty; every user is allowed");
    } else {
        log_info(&format!(
            "Allowed users: {}",
            cfg.telegram_allowed_users.len()
        ));
    }

    let state = Arc::new(AppState::new(cfg));

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    log_info("safebot stopped");
    Ok(())
}
