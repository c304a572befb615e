use std::io;
use std::path::{Path, PathBuf};

use dpfp_rs::DpfpError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::quality::Rejection;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Dpfp(#[from] DpfpError),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("I/O error on '{}': {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("user metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("invalid user id {0:?}")]
    InvalidUserId(String),
    #[error("user {0} is already enrolled")]
    DuplicateUser(String),
    #[error("user {0} is not enrolled")]
    UnknownUser(String),
    #[error("no scan of user {0} could be stored")]
    NoSuccessfulScans(String),
    #[error("enrollment of user {user_id} stored {scans_stored} scans but produced no template")]
    EnrollmentIncomplete { user_id: String, scans_stored: usize },
    #[error("scan rejected: {0}")]
    Rejected(Rejection),
    #[error("no enrolled templates to search")]
    EmptyGallery,
    #[error("no finger placed on the reader")]
    NoFinger,
    #[error("another operation is using the reader")]
    Busy,
    #[error("worker stopped without a result")]
    WorkerGone,
    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Wraps an I/O error with the path it happened on.
pub(crate) fn io_error(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}
