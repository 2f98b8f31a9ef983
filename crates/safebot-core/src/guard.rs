//! Failure guards for async callbacks.
//!
//! [`SafeEventHandler`] absorbs failures of bot event handlers: it logs them, tells the
//! originating chat that something went wrong, and returns `None` so dispatching continues.
//! [`SafeFunction`] only logs and then hands the failure back to its caller.
//!
//! A failure is either an `Err` result or a panic.

use std::{
    any::Any,
    backtrace::Backtrace,
    cell::RefCell,
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::Once,
};

use futures::FutureExt;

use crate::{
    logging::{self, Logger},
    notify::{EventArgs, Notifiable},
};

/// Notice sent to the originating chat when a guarded event handler fails.
pub const ERROR_NOTICE: &str = "⚠️ An error occurred while processing your request. \
     The bot is still running and you can try again.";

/// Wraps an event handler so its failures never reach the dispatcher.
pub struct SafeEventHandler<F> {
    name: &'static str,
    doc: Option<&'static str>,
    logger: Option<Logger>,
    inner: F,
}

/// Wraps a plain async function so its failures are logged on the way out.
pub struct SafeFunction<F> {
    name: &'static str,
    doc: Option<&'static str>,
    logger: Option<Logger>,
    inner: F,
}

pub fn safe_event_handler<F>(name: &'static str, inner: F) -> SafeEventHandler<F> {
    SafeEventHandler::new(name, inner)
}

pub fn safe_function<F>(name: &'static str, inner: F) -> SafeFunction<F> {
    SafeFunction::new(name, inner)
}

/// Guard a named handler function, taking its name from the path.
///
/// ```ignore
/// let guarded = safe_event_handler!(handlers::text::handle_text);
/// assert_eq!(guarded.name(), "handle_text");
/// ```
#[macro_export]
macro_rules! safe_event_handler {
    ($f:path) => {
        $crate::guard::SafeEventHandler::new($crate::guard::last_segment(stringify!($f)), $f)
    };
}

/// Like [`safe_event_handler!`], for [`SafeFunction`].
#[macro_export]
macro_rules! safe_function {
    ($f:path) => {
        $crate::guard::SafeFunction::new($crate::guard::last_segment(stringify!($f)), $f)
    };
}

#[doc(hidden)]
pub fn last_segment(path: &'static str) -> &'static str {
    path.rsplit("::").next().unwrap_or(path).trim()
}

macro_rules! guard_metadata {
    ($ty:ident) => {
        impl<F> $ty<F> {
            pub fn new(name: &'static str, inner: F) -> Self {
                Self {
                    name,
                    doc: None,
                    logger: None,
                    inner,
                }
            }

            /// Log to `logger` instead of the process-wide sink.
            pub fn with_logger(mut self, logger: Logger) -> Self {
                self.logger = Some(logger);
                self
            }

            pub fn with_doc(mut self, doc: &'static str) -> Self {
                self.doc = Some(doc);
                self
            }

            /// Name of the wrapped function, as used in log records.
            pub fn name(&self) -> &'static str {
                self.name
            }

            pub fn doc(&self) -> Option<&'static str> {
                self.doc
            }

        }

        impl<F> fmt::Debug for $ty<F> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("name", &self.name)
                    .field("doc", &self.doc)
                    .finish_non_exhaustive()
            }
        }
    };
}

guard_metadata!(SafeEventHandler);
guard_metadata!(SafeFunction);

impl<F> SafeEventHandler<F> {
    /// Run the handler. `Some` carries its value; `None` means it failed and was logged.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Option<T>
    where
        F: Fn(A) -> Fut,
        A: EventArgs,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug,
    {
        let responder = args.responder();
        let outcome = AssertUnwindSafe(async { (self.inner)(args).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => report_error(self.logger.as_ref(), self.name, &err),
            Err(payload) => report_panic(self.logger.as_ref(), self.name, payload.as_ref()),
        }

        if let Some(responder) = responder {
            notify_quietly(responder.as_ref()).await;
        }
        None
    }
}

impl<F> SafeFunction<F> {
    /// Run the function. Errors come back unchanged and panics keep unwinding, after logging.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug,
    {
        let outcome = AssertUnwindSafe(async { (self.inner)(args).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                report_error(self.logger.as_ref(), self.name, &err);
                Err(err)
            }
            Err(payload) => {
                report_panic(self.logger.as_ref(), self.name, payload.as_ref());
                panic::resume_unwind(payload)
            }
        }
    }
}

/// Where the last panic on this thread happened, recorded by the panic hook.
struct PanicSite {
    location: Option<String>,
    backtrace: Backtrace,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Record the location and backtrace of every panic so guards can log them.
///
/// Chains to the previously installed hook. Runs once per process; [`logging::init`] calls it.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let site = PanicSite {
                location: info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
                backtrace: Backtrace::force_capture(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(site));
            previous(info);
        }));
    });
}

fn take_panic_site() -> Option<PanicSite> {
    LAST_PANIC.with(|slot| slot.borrow_mut().take())
}

/// Send [`ERROR_NOTICE`], discarding any error or panic from the send.
async fn notify_quietly(responder: &dyn Notifiable) {
    let sent = AssertUnwindSafe(async { responder.respond(ERROR_NOTICE).await })
        .catch_unwind()
        .await;
    if sent.is_err() {
        take_panic_site();
    }
}

fn report_error<E>(logger: Option<&Logger>, name: &str, err: &E)
where
    E: fmt::Display + fmt::Debug,
{
    let kind = short_type_name::<E>();
    let backtrace = Backtrace::force_capture();
    logging::scoped(logger, || {
        tracing::error!(report = ?err, backtrace = %backtrace, "Error in {name}: {kind}: {err}");
    });
}

fn report_panic(logger: Option<&Logger>, name: &str, payload: &(dyn Any + Send)) {
    let message = panic_message(payload);
    let site = take_panic_site();
    logging::scoped(logger, || match site {
        Some(PanicSite {
            location: Some(location),
            backtrace,
        }) => tracing::error!(
            location = %location,
            backtrace = %backtrace,
            "Error in {name}: panic: {message}"
        ),
        Some(PanicSite {
            location: None,
            backtrace,
        }) => tracing::error!(backtrace = %backtrace, "Error in {name}: panic: {message}"),
        None => tracing::error!("Error in {name}: panic: {message}"),
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "Box<dyn Any>"
    }
}

/// Type name with module paths stripped: `core::num::ParseIntError` -> `ParseIntError`.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    let mut chars = full.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            segment.clear();
        } else if c.is_alphanumeric() || c == '_' {
            segment.push(c);
        } else {
            out.push_str(&segment);
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(&segment);
    out
}
