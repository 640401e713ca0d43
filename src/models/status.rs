/// Placeholder for a storage figure that could not be read
pub const UNKNOWN_SIZE: &str = "-";

/// Placeholder usage percentage
pub const UNKNOWN_PERCENT: &str = "0%";

/// Placeholder for a system field that could not be read
pub const UNKNOWN: &str = "Unknown";

/// Usage of the module content storage, as display strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUsage {
    pub size: String,
    pub used: String,
    pub avail: String,
    pub percent: String,
    /// Backing filesystem (`tmpfs`, `ext4`, ...); `None` when unknown
    pub fs_type: Option<String>,
}

impl Default for StorageUsage {
    fn default() -> Self {
        Self {
            size: UNKNOWN_SIZE.to_string(),
            used: UNKNOWN_SIZE.to_string(),
            avail: UNKNOWN_SIZE.to_string(),
            percent: UNKNOWN_PERCENT.to_string(),
            fs_type: None,
        }
    }
}

/// Daemon-reported disagreement on the kernel interface version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMismatch {
    pub message: String,
}

/// Kernel identity and daemon mount state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub kernel: String,
    pub selinux: String,
    pub mount_base: String,
    pub active_partitions: Vec<String>,
    pub active_module_ids: Vec<String>,
    pub mismatch: Option<ProtocolMismatch>,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            kernel: UNKNOWN.to_string(),
            selinux: UNKNOWN.to_string(),
            mount_base: UNKNOWN.to_string(),
            active_partitions: Vec::new(),
            active_module_ids: Vec::new(),
            mismatch: None,
        }
    }
}

/// Everything the status view shows, replaced as a whole on each refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub storage: StorageUsage,
    pub system: SystemInfo,
}

impl StatusSnapshot {
    /// True if the daemon currently mounts the given module
    pub fn is_module_active(&self, id: &str) -> bool {
        self.system.active_module_ids.iter().any(|m| m == id)
    }
}
