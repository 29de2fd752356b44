use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no credential configured for owner {0}")]
    NoCredential(String),

    #[error("session error: {0}")]
    Session(String),
}
