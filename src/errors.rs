//! error type shared by reference set construction, identification and mixture analysis

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KmerIdError {
    #[error("io error on {path:?} : {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// an external collaborator exited with failure or gave no output
    #[error("collaborator {tool} failed : {msg}")]
    Collaborator { tool: String, msg: String },

    #[error("collaborator {tool} did not finish within {secs} s")]
    Timeout { tool: String, secs: u64 },

    #[error("could not parse {what} from line {line:?}")]
    Parse { what: String, line: String },

    #[error("malformed similarity matrix {path:?} : {msg}")]
    MalformedMatrix { path: PathBuf, msg: String },

    #[error("cannot make {requested} clusters out of {items} items")]
    InvalidClusterCount { requested: usize, items: usize },

    #[error("group {0} has no genome")]
    EmptyGroup(String),

    #[error("catalog error : {0}")]
    Catalog(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
} // end of KmerIdError

impl KmerIdError {
    /// wraps an io::Error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KmerIdError::Io {
            path: path.into(),
            source,
        }
    }

    /// true for failures a fine stage genus can recover from by being dropped
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            KmerIdError::Collaborator { .. }
                | KmerIdError::Timeout { .. }
                | KmerIdError::Parse { .. }
                | KmerIdError::Io { .. }
        )
    }
}
