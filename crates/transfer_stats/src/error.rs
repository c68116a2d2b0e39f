use std::path::PathBuf;

use crate::persistence::StatsFormat;

/// Errors writing statistics to durable storage.
///
/// Loading never fails: unreadable history is the same as no history.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("error creating directory {path:?}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error serializing stats as {format}")]
    Serialize {
        format: StatsFormat,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} is a read-only stats format")]
    ReadOnlyFormat(StatsFormat),
    #[error("error writing {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error renaming {from:?} to {to:?}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = core::result::Result<T, Error>;
