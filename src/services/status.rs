//! Builds a [`StatusSnapshot`] from independent device probes.
//!
//! Nothing here returns an error. A probe that failed to run, exited non-zero
//! or printed something unparsable simply leaves its fields at the "unknown"
//! defaults.

use crate::channel::{ChannelError, CommandOutput};
use crate::models::status::UNKNOWN;
use crate::models::{ProtocolMismatch, StatusSnapshot, StorageUsage, SystemInfo};
use serde::Deserialize;
use serde_json::Value;

/// Outcome of one channel call
pub type Reading = Result<CommandOutput, ChannelError>;

/// The two probes that make up system information
#[derive(Debug)]
pub struct SystemReading {
    /// `KERNEL:` / `SELINUX:` line probe
    pub identity: Reading,
    /// Daemon state JSON
    pub daemon_state: Reading,
}

fn successful_stdout<'a>(reading: &'a Reading, what: &str) -> Option<&'a str> {
    match reading {
        Ok(output) => {
            let stdout = output.stdout_if_ok();
            if stdout.is_none() {
                tracing::warn!(
                    "{} probe failed (status {}): {}",
                    what,
                    output.status,
                    output.stderr.trim()
                );
            }
            stdout
        }
        Err(e) => {
            tracing::warn!("{} probe could not run: {}", what, e);
            None
        }
    }
}

#[derive(Deserialize)]
struct StorageDocument {
    size: Option<String>,
    used: Option<String>,
    avail: Option<String>,
    percent: Option<String>,
    #[serde(rename = "type")]
    fs_type: Option<String>,
    error: Option<String>,
}

/// Storage usage from the daemon's `storage` JSON
pub fn parse_storage(reading: &Reading) -> StorageUsage {
    let Some(stdout) = successful_stdout(reading, "Storage") else {
        return StorageUsage::default();
    };

    let document: StorageDocument = match serde_json::from_str(stdout) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("Unparsable storage JSON: {}", e);
            return StorageUsage::default();
        }
    };

    if let Some(error) = document.error {
        tracing::warn!("Daemon reported storage error: {}", error);
        return StorageUsage::default();
    }

    let defaults = StorageUsage::default();
    StorageUsage {
        size: document.size.unwrap_or(defaults.size),
        used: document.used.unwrap_or(defaults.used),
        avail: document.avail.unwrap_or(defaults.avail),
        percent: document.percent.unwrap_or(defaults.percent),
        fs_type: document.fs_type.filter(|t| !t.is_empty()),
    }
}

/// Kernel release and SELinux mode from the two-line identity probe.
///
/// Either line may be missing; missing values stay `None`.
pub fn parse_identity(stdout: &str) -> (Option<String>, Option<String>) {
    let mut kernel = None;
    let mut selinux = None;

    for line in stdout.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("KERNEL:") {
            kernel = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        } else if let Some(value) = line.strip_prefix("SELINUX:") {
            selinux = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        }
    }

    (kernel, selinux)
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Apply the daemon state document to `info`, field by field.
///
/// A field with the wrong type is treated as absent rather than failing the
/// whole document.
pub fn apply_daemon_state(info: &mut SystemInfo, json: &str) {
    let state: Value = match serde_json::from_str(json) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!("Failed to parse daemon state JSON: {}", e);
            return;
        }
    };

    if let Some(mount_point) = state
        .get("mount_point")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
    {
        info.mount_base = mount_point.to_string();
    }
    info.active_partitions = string_array(state.get("active_mounts"));
    info.active_module_ids = string_array(state.get("hymofs_module_ids"));

    if state.get("hymofs_mismatch").and_then(Value::as_bool) == Some(true) {
        let message = state
            .get("mismatch_message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info.mismatch = Some(ProtocolMismatch { message });
    }
}

/// System information from both probes
pub fn parse_system(reading: &SystemReading) -> SystemInfo {
    let mut info = SystemInfo::default();

    if let Some(stdout) = successful_stdout(&reading.identity, "System identity") {
        let (kernel, selinux) = parse_identity(stdout);
        info.kernel = kernel.unwrap_or_else(|| UNKNOWN.to_string());
        info.selinux = selinux.unwrap_or_else(|| UNKNOWN.to_string());
    }

    if let Some(stdout) = successful_stdout(&reading.daemon_state, "Daemon state") {
        apply_daemon_state(&mut info, stdout);
    }

    info
}

/// Combine storage and system readings into one snapshot
pub fn aggregate(storage: &Reading, system: &SystemReading) -> StatusSnapshot {
    let snapshot = StatusSnapshot {
        storage: parse_storage(storage),
        system: parse_system(system),
    };

    tracing::debug!(
        "Status: storage {} of {} ({}), kernel {}, {} active partitions",
        snapshot.storage.used,
        snapshot.storage.size,
        snapshot.storage.percent,
        snapshot.system.kernel,
        snapshot.system.active_partitions.len()
    );

    snapshot
}
