use std::sync::Arc;

use crate::router::AppState;
use crate::CallbackEvent;

const UNAUTHORIZED: &str = "Unauthorized";

pub async fn handle_callback(
    (event, state): (Arc<CallbackEvent>, Arc<AppState>),
) -> anyhow::Result<()> {
    // Always answer the query so the client stops its spinner.
    if !state.cfg.is_authorized(Some(event.user_id())) {
        event.answer(Some(UNAUTHORIZED)).await?;
        return Ok(());
    }

    let data = event.data();
    if data.is_empty() {
        event.answer(None).await?;
        return Ok(());
    }

    event.answer(Some(&format!("Received: {data}"))).await?;
    Ok(())
}
