//! Data models for the Hymo client state layer.
//!
//! - [`Configuration`]: daemon configuration edited by the user
//! - [`ModuleRecord`] / [`Rule`]: scanned modules merged with local overrides
//! - [`LogRecord`]: one classified log line
//! - [`StatusSnapshot`]: storage usage, kernel identity and daemon mount state
//! - [`SessionState`]: all of the above plus per-resource loading flags
//!
//! All values are owned and cloned in and out of
//! [`Session`](crate::state::Session); nothing keeps references into live state.

pub mod configuration;
pub mod log;
pub mod module;
pub mod session_state;
pub mod status;

pub use configuration::Configuration;
pub use log::{LogLevel, LogRecord, LogSource};
pub use module::{ModeStats, ModuleMode, ModuleRecord, Rule};
pub use session_state::{LoadingFlags, Resource, SavingFlags, SessionState, UnreadOverrides};
pub use status::{ProtocolMismatch, StatusSnapshot, StorageUsage, SystemInfo};
