use camino::Utf8PathBuf;
use indexmap::IndexSet;

/// Default directory the daemon scans for modules
pub const DEFAULT_MODULE_DIR: &str = "/data/adb/modules/";

/// Default overlay source label
pub const DEFAULT_MOUNT_SOURCE: &str = "KSU";

/// Default daemon log file
pub const DEFAULT_LOG_FILE: &str = "/data/adb/hymo/daemon.log";

/// Daemon configuration as edited by the user.
///
/// Mirrors the key-value file the daemon reads at boot. Empty path fields mean
/// "let the daemon decide" and are not written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub moduledir: Utf8PathBuf,
    pub tempdir: Utf8PathBuf,
    pub mountsource: String,
    pub logfile: Utf8PathBuf,

    pub verbose: bool,
    pub force_ext4: bool,
    pub disable_umount: bool,
    pub enable_nuke: bool,
    pub ignore_protocol_mismatch: bool,
    pub enable_kernel_debug: bool,
    pub enable_stealth: bool,

    /// Extra partitions to mount, deduplicated in insertion order
    pub partitions: IndexSet<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            moduledir: Utf8PathBuf::from(DEFAULT_MODULE_DIR),
            tempdir: Utf8PathBuf::new(),
            mountsource: DEFAULT_MOUNT_SOURCE.to_string(),
            logfile: Utf8PathBuf::from(DEFAULT_LOG_FILE),
            verbose: false,
            force_ext4: false,
            disable_umount: false,
            enable_nuke: false,
            ignore_protocol_mismatch: false,
            enable_kernel_debug: false,
            enable_stealth: false,
            partitions: IndexSet::new(),
        }
    }
}

impl Configuration {
    /// Add a partition unless it is blank or already present.
    ///
    /// Returns true if the partition was added.
    pub fn add_partition(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.partitions.insert(name.to_string())
    }

    /// Remove a partition, keeping the order of the rest.
    pub fn remove_partition(&mut self, name: &str) -> bool {
        self.partitions.shift_remove(name.trim())
    }
}
