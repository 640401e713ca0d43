//! Services module - the pure logic behind the session.
//!
//! None of these touch the device. They take text (or channel readings) and
//! return models, which keeps them testable without a command channel.
//!
//! # Components
//!
//! - [`config_codec`]: parse/serialize the daemon's `key = value` configuration
//! - [`reconciler`]: merge the module inventory with stored mode and rule
//!   overrides, and extract overrides back out for saving
//! - [`log_classifier`]: split raw log text into leveled records
//! - [`status`]: combine storage and system probes into a status snapshot
//! - [`commands`]: shell command text for every channel call

pub mod commands;
pub mod config_codec;
pub mod log_classifier;
pub mod reconciler;
pub mod status;

pub use log_classifier::classify;
pub use reconciler::{
    InventoryError, ModeOverrides, RawModule, RuleOverrides, extract_modes, extract_rules,
    reconcile,
};
pub use status::{Reading, SystemReading, aggregate};
