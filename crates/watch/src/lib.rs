//! # Dropwatch Watch
//!
//! Directory watch lifecycle and canonical event translation.
//!
//! ## Pipeline
//!
//! ```text
//! OS notifications
//!     │
//!     ├──> Backend (platform facility behind a capability trait)
//!     │      └─> RawEvent stream
//!     │
//!     └──> WatchManager (watch table, auto-add, synthesized creates)
//!            └─> EventSink::on_events(watch, [(path, Create|Modify|Delete)])
//! ```
//!
//! The manager keeps one watch per tracked directory and owns all table
//! mutation behind a single mutex, so setup-time calls and the delivery
//! task can interleave safely.

mod backend;
mod error;
mod events;
mod filter;
mod manager;

pub use backend::{NotifyBackend, WatchBackend};
pub use error::{Result, WatchError};
pub use events::{strip_unresolved_marker, CanonicalEvent, RawEvent, RawKind, WatchId};
pub use filter::PathFilter;
pub use manager::{spawn_delivery_loop, EventFilter, EventSink, WatchManager};
