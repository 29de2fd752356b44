//! # Dropwatch CLI
//!
//! Configuration, pipeline wiring, and the daemon run loop behind the
//! `dropwatch` binary.
//!
//! ```text
//! Config (TOML)
//!     │
//!     ├──> WatchManager over the notify backend
//!     │       └─> EventDispatcher (filter → resolver → registry)
//!     │
//!     └──> ImportInvoker on the fired-fileset channel
//! ```

pub mod config;
pub mod dispatch;
pub mod resolver;
pub mod run;
