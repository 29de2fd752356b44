use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One importable unit: a representative key and the full member sequence.
/// The key is always one of the members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fileset {
    pub key: PathBuf,
    pub members: Vec<PathBuf>,
}

/// Maps one changed path to the import unit(s) it belongs to.
///
/// Implementations own the membership policy. An empty map means the path
/// is not (yet) part of a recognized unit — common while a unit is still
/// being copied in.
pub trait FilesetResolver: Send + Sync {
    fn resolve(&self, path: &Path) -> HashMap<PathBuf, Vec<PathBuf>>;
}
