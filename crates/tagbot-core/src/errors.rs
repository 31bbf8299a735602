/// Core error type for the tag bot.
///
/// Adapter crates map their specific errors into this type. Most callers in the
/// core do not propagate these further: persistence and platform failures are
/// logged at the boundary and the bot keeps running on in-memory state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
