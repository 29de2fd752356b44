//! # Dropwatch Registry
//!
//! Debounce state for filesets: coalesces bursts of change events into a
//! single trigger per quiet fileset.
//!
//! ## Pipeline
//!
//! ```text
//! (key, members) updates
//!     │
//!     ├──> DebounceRegistry (arena of entries + path index)
//!     │      └─> per-entry OneshotTimer, reset on every touching event
//!     │
//!     └──> [window elapses] ──> entry evicted ──> Fileset on the fired
//!                                                 channel
//! ```
//!
//! Eviction happens under the registry mutex *before* delivery, so a reset
//! racing a firing either cancels it or starts over with a fresh entry —
//! the same fileset state never triggers twice.

mod error;
mod fileset;
mod registry;
mod timer;

pub use error::{RegistryError, Result};
pub use fileset::{Fileset, FilesetResolver};
pub use registry::{DebounceRegistry, EntryId};
pub use timer::OneshotTimer;
