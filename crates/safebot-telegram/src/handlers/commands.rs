use std::time::Duration;

use anyhow::bail;

use safebot_core::notify::Notifiable;

use crate::router::AppState;
use crate::ChatEvent;

const HELP: &str = "🤖 safebot\n\n\
Commands:\n\
/start - Show this help message\n\
/help - Show this help message\n\
/status - Uptime and handler counters\n\
/fail - Fail on purpose (the bot keeps running)\n\n\
Anything else is echoed back.";

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn format_duration(d: Duration) -> String {
    let seconds = d.as_secs();
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

fn status_text(uptime: Duration, handled: u64, failed: u64) -> String {
    format!(
        "📊 Status\n\nUptime: {}\nHandled updates: {handled}\nFailed updates: {failed}",
        format_duration(uptime)
    )
}

pub async fn handle_command<E: ChatEvent + ?Sized>(
    event: &E,
    state: &AppState,
    text: &str,
) -> anyhow::Result<()> {
    let (cmd, arg) = parse_command(text);

    match cmd.as_str() {
        "start" | "help" => event.respond(HELP).await?,
        "status" => {
            let body = status_text(
                state.started.elapsed(),
                state.stats.handled(),
                state.stats.failed(),
            );
            event.respond(&body).await?;
        }
        "fail" => {
            let reason = if arg.is_empty() {
                "no reason given"
            } else {
                arg.as_str()
            };
            bail!("/fail requested by chat {}: {reason}", event.chat_id());
        }
        _ => event.respond(&format!("Unknown command: /{cmd}")).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/Fail@safebot disk on fire"),
            ("fail".to_string(), "disk on fire".to_string())
        );
        assert_eq!(
            parse_command("  /status  "),
            ("status".to_string(), String::new())
        );
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn status_lists_counters() {
        let text = status_text(Duration::from_secs(61), 10, 2);
        assert!(text.contains("Uptime: 1m 1s"));
        assert!(text.contains("Handled updates: 10"));
        assert!(text.contains("Failed updates: 2"));
    }
}
