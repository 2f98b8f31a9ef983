//! Failure guards and logging for the bot's event handlers.
//!
//! Framework-agnostic: the Telegram adapter implements [`notify::Notifiable`] for its event
//! types and wraps its endpoints in [`guard::SafeEventHandler`].

pub mod config;
pub mod errors;
pub mod guard;
pub mod logging;
pub mod notify;

pub use errors::{Error, Result};
pub use guard::{safe_event_handler, safe_function, SafeEventHandler, SafeFunction, ERROR_NOTICE};
pub use logging::{log_error, log_info, log_warning, Logger};
pub use notify::{EventArgs, Notifiable, Silent};
