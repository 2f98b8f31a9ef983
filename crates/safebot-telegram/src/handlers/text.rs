use crate::ChatEvent;

/// Max echoed characters; longer input is cut with an ellipsis.
const ECHO_LIMIT: usize = 4000;

fn echo_reply(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= ECHO_LIMIT {
        return Some(trimmed.to_string());
    }
    let mut cut: String = trimmed.chars().take(ECHO_LIMIT).collect();
    cut.push('…');
    Some(cut)
}

pub async fn handle_text<E: ChatEvent + ?Sized>(event: &E, text: &str) -> anyhow::Result<()> {
    if let Some(reply) = echo_reply(text) {
        event.respond(&reply).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echoes_trimmed_text() {
        assert_eq!(echo_reply("  hi 👋 "), Some("hi 👋".to_string()));
        assert_eq!(echo_reply("   "), None);
    }

    #[test]
    fn long_text_is_cut_on_char_boundary() {
        let long = "é".repeat(ECHO_LIMIT + 10);
        let reply = echo_reply(&long).unwrap();
        assert_eq!(reply.chars().count(), ECHO_LIMIT + 1);
        assert!(reply.ends_with('…'));
    }
}
