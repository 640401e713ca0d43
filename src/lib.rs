// Hymo State - client-side state layer for the Hymo module mount daemon
//
// This is the library crate containing the session, models and parsing logic.
// The binary crate (main.rs) provides a command-line front end.

pub mod channel;
pub mod config;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use channel::{ChannelError, CommandChannel, CommandOutput, MockChannel, ShellChannel};
pub use config::{AppSettings, Backend, SettingsManager};
pub use models::{
    Configuration, LogLevel, LogRecord, LogSource, ModeStats, ModuleMode, ModuleRecord, Rule,
    SessionState, StatusSnapshot,
};
pub use state::{NoticeLevel, Session, SessionError, StateChange};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
