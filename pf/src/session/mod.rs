//! Session management
//!
//! A session ties a caller's id to one assistant conversation, its turn
//! history and its inactivity timer. The [`SessionRegistry`] is the only
//! owner of live sessions.

mod monitor;
mod registry;
mod types;

pub use monitor::{InactivityExpired, InactivityMonitor};
pub use registry::SessionRegistry;
pub use types::{Contact, Session, SessionInfo, Turn};
