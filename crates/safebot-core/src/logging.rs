//! Process-wide log sink: one append-mode file plus stdout, sharing one record format.
//!
//! Records look like `<timestamp> - <target> - <LEVEL> - <message>`. Error reports and
//! backtraces attached to a record follow on indented continuation lines.

use std::{
    backtrace::Backtrace,
    fmt,
    fs::OpenOptions,
    io,
    sync::{Arc, Mutex, OnceLock},
};

use chrono::Local;
use tracing::{
    field::{Field, Visit},
    Dispatch, Event, Level, Subscriber,
};
use tracing_log::{LogTracer, NormalizeEvent};
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{
        self as fmt_layer,
        format::{DefaultFields, Writer},
        FmtContext, FormatEvent, FormatFields, MakeWriter,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    Registry,
};

use crate::{config::LogConfig, errors::Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Fields rendered on continuation lines instead of inline `key=value` pairs.
const DETAIL_FIELDS: [&str; 2] = ["report", "backtrace"];

/// Prefix of the metadata fields `tracing-log` attaches to bridged `log` records.
const LOG_FIELD_PREFIX: &str = "log.";

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// Initialize the process-wide sink.
///
/// Only the first call opens the file; later calls return the sink created by the first one,
/// so destinations are never duplicated.
pub fn init(cfg: &LogConfig) -> Result<&'static Logger> {
    if let Some(logger) = GLOBAL.get() {
        return Ok(logger);
    }
    Ok(init_with(Logger::open(cfg)?))
}

/// Install an already built sink as the process-wide one.
///
/// The first sink installed wins. It also becomes the global `tracing` dispatcher (unless
/// another subscriber got there first), receives `log` records from the framework crates, and
/// panics start recording their location for the guards.
pub fn init_with(logger: Logger) -> &'static Logger {
    let mut installed = false;
    let logger = GLOBAL.get_or_init(|| {
        installed = true;
        logger
    });
    if installed {
        let _ = tracing::dispatcher::set_global_default(logger.dispatch.clone());
        let _ = LogTracer::init_with_filter(log::LevelFilter::Info);
        crate::guard::install_panic_hook();
    }
    logger
}

/// The sink created by [`init`], if it ran.
pub fn global() -> Option<&'static Logger> {
    GLOBAL.get()
}

/// Run `f` with `logger` (or the global sink, or the current dispatcher) as the default.
pub(crate) fn scoped<R>(logger: Option<&Logger>, f: impl FnOnce() -> R) -> R {
    match logger.or_else(|| global()) {
        Some(logger) => logger.in_scope(f),
        None => f(),
    }
}

pub fn log_info(message: &str) {
    scoped(None, || emit_info(message));
}

pub fn log_warning(message: &str) {
    scoped(None, || emit_warning(message));
}

/// Log at error level, optionally attaching a backtrace of the calling thread.
pub fn log_error(message: &str, with_backtrace: bool) {
    scoped(None, || emit_error(message, with_backtrace));
}

fn emit_info(message: &str) {
    tracing::info!("{message}");
}

fn emit_warning(message: &str) {
    tracing::warn!("{message}");
}

fn emit_error(message: &str, with_backtrace: bool) {
    if with_backtrace {
        let backtrace = Backtrace::force_capture();
        tracing::error!(backtrace = %backtrace, "{message}");
    } else {
        tracing::error!("{message}");
    }
}

/// Handle to a log sink.
///
/// Cheap to clone; every clone writes to the same destinations.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Logger {
    /// Open the file named by `cfg` in append mode and mirror it to stdout if enabled.
    pub fn open(cfg: &LogConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.file_path)
            .map_err(|source| Error::Logging {
                path: cfg.file_path.clone(),
                source,
            })?;

        let level = LevelFilter::from_level(cfg.level);
        let file = Mutex::new(file);
        Ok(if cfg.console {
            Self::with_writers(level, file, io::stdout)
        } else {
            Self::with_writer(level, file)
        })
    }

    /// Sink with a single destination.
    pub fn with_writer<W>(level: LevelFilter, writer: W) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = Registry::default().with(level).with(record_layer(writer));
        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    /// Sink writing every record to both `file` and `console`.
    pub fn with_writers<F, C>(level: LevelFilter, file: F, console: C) -> Self
    where
        F: for<'w> MakeWriter<'w> + Send + Sync + 'static,
        C: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = Registry::default()
            .with(level)
            .with(record_layer(file))
            .with(record_layer(console));
        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    /// Run `f` with this sink as the thread's default dispatcher.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    pub fn info(&self, message: &str) {
        self.in_scope(|| emit_info(message));
    }

    pub fn warning(&self, message: &str) {
        self.in_scope(|| emit_warning(message));
    }

    pub fn error(&self, message: &str, with_backtrace: bool) {
        self.in_scope(|| emit_error(message, with_backtrace));
    }
}

fn record_layer<S, W>(writer: W) -> fmt_layer::Layer<S, DefaultFields, RecordFormat, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt_layer::layer()
        .with_ansi(false)
        .event_format(RecordFormat)
        .with_writer(writer)
}

/// `<timestamp> - <target> - <LEVEL> - <message>` followed by detail lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordFormat;

impl<S, N> FormatEvent<S, N> for RecordFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let normalized = event.normalized_metadata();
        let meta = normalized.as_ref().unwrap_or_else(|| event.metadata());
        let mut fields = RecordFields::default();
        event.record(&mut fields);

        write!(
            writer,
            "{} - {} - {} - {}",
            Local::now().format(TIMESTAMP_FORMAT),
            meta.target(),
            level_name(meta.level()),
            fields.message
        )?;
        for (name, value) in &fields.inline {
            write!(writer, " {name}={value}")?;
        }
        for block in &fields.detail {
            for line in block.lines() {
                write!(writer, "\n    {line}")?;
            }
        }
        writeln!(writer)
    }
}

fn level_name(level: &Level) -> &'static str {
    if *level == Level::ERROR {
        "ERROR"
    } else if *level == Level::WARN {
        "WARNING"
    } else if *level == Level::INFO {
        "INFO"
    } else if *level == Level::DEBUG {
        "DEBUG"
    } else {
        "TRACE"
    }
}

#[derive(Default)]
struct RecordFields {
    message: String,
    inline: Vec<(&'static str, String)>,
    detail: Vec<String>,
}

impl RecordFields {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            name if name.starts_with(LOG_FIELD_PREFIX) => {}
            name if DETAIL_FIELDS.contains(&name) => self.detail.push(value),
            name => self.inline.push((name, value)),
        }
    }
}

impl Visit for RecordFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

/// In-memory destination, used to capture formatted records.
#[derive(Clone, Default)]
pub struct MemoryWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl io::Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MemoryWriter {
    type Writer = MemoryWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_log(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "safebot-{name}-{}.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn split_record(line: &str) -> Vec<&str> {
        line.splitn(4, " - ").collect()
    }

    #[test]
    fn record_has_timestamp_target_level_message() {
        let mem = MemoryWriter::new();
        let logger = Logger::with_writer(LevelFilter::INFO, mem.clone());
        logger.info("bot started 🚀 héllo");

        let out = mem.contents();
        assert!(out.ends_with('\n'));
        let parts = split_record(out.trim_end());
        assert_eq!(parts.len(), 4);

        let ts = parts[0];
        assert_eq!(ts.len(), 23);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[19..20], ",");

        assert_eq!(parts[1], "safebot_core::logging");
        assert_eq!(parts[2], "INFO");
        assert_eq!(parts[3], "bot started 🚀 héllo");
    }

    #[test]
    fn warnings_use_full_level_name() {
        let mem = MemoryWriter::new();
        let logger = Logger::with_writer(LevelFilter::INFO, mem.clone());
        logger.warning("disk almost full");

        let out = mem.contents();
        assert_eq!(split_record(out.trim_end())[2], "WARNING");
    }

    #[test]
    fn records_below_info_are_dropped() {
        let mem = MemoryWriter::new();
        let logger = Logger::with_writer(LevelFilter::INFO, mem.clone());
        logger.in_scope(|| tracing::debug!("noise"));
        logger.in_scope(|| tracing::trace!("more noise"));
        assert!(mem.contents().is_empty());
    }

    #[test]
    fn inline_fields_follow_the_message() {
        let mem = MemoryWriter::new();
        let logger = Logger::with_writer(LevelFilter::INFO, mem.clone());
        logger.in_scope(|| tracing::info!(chat_id = 42, "sent"));

        assert!(mem.contents().trim_end().ends_with(" - INFO - sent chat_id=42"));
    }

    #[test]
    fn backtrace_goes_on_continuation_lines() {
        let mem = MemoryWriter::new();
        let logger = Logger::with_writer(LevelFilter::INFO, mem.clone());
        logger.error("something broke", true);

        let out = mem.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines.len() >= 2);
        assert!(lines[0].ends_with(" - ERROR - something broke"));
        assert!(lines[1..].iter().all(|l| l.starts_with("    ")));
    }

    #[test]
    fn error_without_backtrace_is_one_line() {
        let mem = MemoryWriter::new();
        let logger = Logger::with_writer(LevelFilter::INFO, mem.clone());
        logger.error("plain failure", false);
        assert_eq!(mem.contents().lines().count(), 1);
    }

    #[test]
    fn both_destinations_receive_identical_records() {
        let file = MemoryWriter::new();
        let console = MemoryWriter::new();
        let logger = Logger::with_writers(LevelFilter::INFO, file.clone(), console.clone());

        logger.info("one");
        logger.warning("two ⚠️");
        logger.error("three", false);

        let file_out = file.contents();
        assert_eq!(file_out.lines().count(), 3);
        assert_eq!(file_out, console.contents());
    }

    #[test]
    fn file_sink_appends_utf8() {
        let path = temp_log("append");
        let cfg = LogConfig {
            file_path: path.clone(),
            console: false,
            level: Level::INFO,
        };

        Logger::open(&cfg).unwrap().info("first ✅");
        Logger::open(&cfg).unwrap().info("second 🤖");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO - first ✅"));
        assert!(lines[1].ends_with(" - INFO - second 🤖"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn open_reports_unwritable_path() {
        let cfg = LogConfig {
            file_path: PathBuf::from("/nonexistent-safebot-dir/x/bot_errors.log"),
            console: false,
            level: Level::INFO,
        };
        let err = Logger::open(&cfg).unwrap_err();
        assert!(matches!(err, Error::Logging { .. }));
    }

    // The only test touching the process-wide sink.
    #[test]
    fn global_sink_is_installed_once_and_receives_every_record() {
        let path = temp_log("global");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        let console = MemoryWriter::new();
        let first = init_with(Logger::with_writers(
            LevelFilter::INFO,
            Mutex::new(file),
            console.clone(),
        ));

        let other = LogConfig {
            file_path: temp_log("global-ignored"),
            console: false,
            level: Level::INFO,
        };
        let second = init(&other).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first, global().unwrap()));
        assert!(!other.file_path.exists());

        log_info("info via helper");
        log_warning("warning via helper ⚠️");
        log_error("error via helper", false);
        log::info!("framework record via log crate");
        log::debug!("framework noise via log crate");

        let file_out = std::fs::read_to_string(&path).unwrap();
        let console_out = console.contents();
        let pick = |out: &str| -> Vec<String> {
            out.lines()
                .filter(|l| l.contains(" via "))
                .map(|l| l.splitn(2, " - ").nth(1).unwrap_or("").to_string())
                .collect()
        };
        let records = pick(&file_out);
        assert_eq!(
            records,
            vec![
                "safebot_core::logging - INFO - info via helper".to_string(),
                "safebot_core::logging - WARNING - warning via helper ⚠️".to_string(),
                "safebot_core::logging - ERROR - error via helper".to_string(),
                "safebot_core::logging::tests - INFO - framework record via log crate"
                    .to_string(),
            ]
        );
        assert_eq!(records, pick(&console_out));

        let _ = std::fs::remove_file(&path);
    }
}
