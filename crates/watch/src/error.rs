use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("no watched ancestor for {0}")]
    NoWatchedAncestor(PathBuf),
}
