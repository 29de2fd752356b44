use std::path::{Path, PathBuf};

/// Identifier for one base watch and the subtree it covers. Auto-added
/// child watches carry the id of their base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Canonical event vocabulary delivered upward. Everything the platform
/// reports is folded into these three or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalEvent {
    Create,
    Modify,
    Delete,
}

/// Raw notification kinds as reported by a backend, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    /// New inode reported under a watched directory.
    Create,
    /// Renamed into the watched tree.
    RenameIn,
    /// File content written.
    Modify,
    /// File descriptor closed after writing.
    CloseWrite,
    /// Inode removed.
    Remove,
    /// Renamed out of the watched tree.
    RenameOut,
    /// Attribute-only change (permissions, timestamps, ownership).
    Metadata,
    /// File opened.
    Open,
    /// File closed without writing.
    CloseNoWrite,
    /// File read.
    Access,
    /// A watched directory itself was removed or moved; the same removal is
    /// also reported by the parent's watch, so this kind is dropped.
    RootGone,
}

/// One notification from the platform backend.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawKind,
    /// Whether the platform flagged the subject as a directory, when known.
    /// `None` means the receiver must decide from the filesystem or its own
    /// watch table.
    pub is_dir: Option<bool>,
}

/// Some backends queue a notification before the changed path is fully
/// resolved and mark it with a trailing `*` component. Strip the marker so
/// classification and table lookups see the real path.
pub fn strip_unresolved_marker(path: &Path) -> PathBuf {
    if path.file_name().is_some_and(|name| name == "*") {
        if let Some(parent) = path.parent() {
            return parent.to_path_buf();
        }
    }
    path.to_path_buf()
}
