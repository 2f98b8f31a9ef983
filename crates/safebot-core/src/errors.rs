use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type at the boundary; handler errors
/// never need to, since the guards accept any `Display + Debug` error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("cannot open log file {path}: {source}")]
    Logging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
