use std::sync::Arc;

use safebot_core::{
    config::{Config, LogConfig},
    log_error, log_info,
};

#[tokio::main]
async fn main() -> Result<(), safebot_core::Error> {
    safebot_core::logging::init(&LogConfig::default())?;

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            log_error(&format!("failed to load configuration: {e}"), false);
            return Err(e);
        }
    };
    log_info("configuration loaded");

    safebot_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| {
            log_error(&format!("telegram bot failed: {e:#}"), true);
            safebot_core::Error::External(format!("telegram bot failed: {e}"))
        })?;

    Ok(())
}
