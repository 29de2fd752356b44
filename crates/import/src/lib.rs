//! # Dropwatch Import
//!
//! Acts on fired filesets: owner resolution, session reuse, and the
//! external import command with bounded retry.
//!
//! ## Pipeline
//!
//! ```text
//! fired Fileset
//!     │
//!     ├──> owner identity (first component under the drop root)
//!     │
//!     ├──> SessionPool (reuse after liveness check, scoped lease)
//!     │
//!     └──> ImportAction (subprocess, captured output)
//!            └─> exit 75 → one immediate retry; anything else terminal
//! ```

mod action;
mod error;
mod invoker;
mod session;

pub use action::{ActionOutput, CommandAction, Endpoint, ImportAction, RETRY_EXIT_CODE};
pub use error::{ImportError, Result};
pub use invoker::{owner_for_path, ImportInvoker, InvokerConfig};
pub use session::{Session, SessionLease, SessionPool, SessionProvider, TokenSessionProvider};
