use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

/// An event that can answer the conversation it came from.
#[async_trait]
pub trait Notifiable: Send + Sync {
    async fn respond(&self, text: &str) -> Result<()>;
}

/// Argument values a guarded event handler can be called with.
///
/// `responder` inspects the first positional argument only: tuples delegate to their first
/// element, `()` has none, and [`Silent`] marks an argument that cannot respond.
pub trait EventArgs {
    fn responder(&self) -> Option<Arc<dyn Notifiable>>;
}

impl EventArgs for () {
    fn responder(&self) -> Option<Arc<dyn Notifiable>> {
        None
    }
}

impl<N: Notifiable + 'static> EventArgs for Arc<N> {
    fn responder(&self) -> Option<Arc<dyn Notifiable>> {
        Some(self.clone())
    }
}

impl EventArgs for Arc<dyn Notifiable> {
    fn responder(&self) -> Option<Arc<dyn Notifiable>> {
        Some(self.clone())
    }
}

impl<A: EventArgs> EventArgs for Option<A> {
    fn responder(&self) -> Option<Arc<dyn Notifiable>> {
        self.as_ref().and_then(EventArgs::responder)
    }
}

impl<A: EventArgs> EventArgs for (A,) {
    fn responder(&self) -> Option<Arc<dyn Notifiable>> {
        self.0.responder()
    }
}

impl<A: EventArgs, B> EventArgs for (A, B) {
    fn responder(&self) -> Option<Arc<dyn Notifiable>> {
        self.0.responder()
    }
}

impl<A: EventArgs, B, C> EventArgs for (A, B, C) {
    fn responder(&self) -> Option<Arc<dyn Notifiable>> {
        self.0.responder()
    }
}

impl<A: EventArgs, B, C, D> EventArgs for (A, B, C, D) {
    fn responder(&self) -> Option<Arc<dyn Notifiable>> {
        self.0.responder()
    }
}

/// First argument that has no way to answer back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Silent<T>(pub T);

impl<T> EventArgs for Silent<T> {
    fn responder(&self) -> Option<Arc<dyn Notifiable>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Chat;

    #[async_trait]
    impl Notifiable for Chat {
        async fn respond(&self, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn only_the_first_argument_is_probed() {
        let chat = Arc::new(Chat);

        assert!(().responder().is_none());
        assert!(chat.responder().is_some());
        assert!((chat.clone(), 1u8).responder().is_some());
        assert!((chat.clone(), "x", 2u8, 'c').responder().is_some());
        assert!((Silent(1u8), chat.clone()).responder().is_none());
        assert!(Silent(chat.clone()).responder().is_none());
    }

    #[test]
    fn absent_first_argument_has_no_responder() {
        let missing: Option<Arc<Chat>> = None;
        assert!(missing.responder().is_none());
        assert!((missing, 3u8).responder().is_none());
        assert!(Some(Arc::new(Chat)).responder().is_some());

        let erased: Arc<dyn Notifiable> = Arc::new(Chat);
        assert!(erased.responder().is_some());
    }
}
