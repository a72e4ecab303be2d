/// Error types shared across the browser
///
/// Catalog errors stay rich (they wrap rusqlite and io errors); anything that
/// has to travel through an iced `Message` is flattened into a cloneable form.

use thiserror::Error;

use crate::state::data::{ImageId, TagId};

/// Errors raised by the SQLite catalog
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not determine user data directory")]
    NoDataDir,

    #[error("a tag named {0:?} already exists")]
    DuplicateTag(String),

    #[error("image {0} does not exist")]
    UnknownImage(ImageId),

    #[error("tag {0} does not exist")]
    UnknownTag(TagId),
}

/// A failed request across the data boundary.
///
/// Cloneable so it can ride along in application messages.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{operation} failed: {reason}")]
pub struct RequestError {
    pub operation: &'static str,
    pub reason: String,
}

impl RequestError {
    pub fn new(operation: &'static str, reason: impl ToString) -> Self {
        Self {
            operation,
            reason: reason.to_string(),
        }
    }
}

/// Errors from the offscreen measurement service
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasureError {
    /// The dedicated off-screen root was never created. This is a broken
    /// embedding, not something a retry can fix.
    #[error("offscreen measurement root is missing")]
    MissingRoot,

    #[error("no element with id {0:?} in measured fragment")]
    TargetNotFound(String),
}

/// Errors loading or saving the gallery configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not determine user config directory")]
    NoConfigDir,
}
