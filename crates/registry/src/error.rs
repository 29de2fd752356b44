use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Caller contract violations. These are programming errors in whoever
/// builds the fileset map, not runtime conditions: merging unrelated
/// filesets silently would be worse than failing, so nothing here is
/// self-healed.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("representative key {0} is not a member of its own sequence")]
    KeyNotMember(PathBuf),

    #[error("empty member sequence for key {0}")]
    EmptySequence(PathBuf),

    #[error("{first} and {second} are linked to different pending filesets")]
    CrossLinked { first: PathBuf, second: PathBuf },
}
