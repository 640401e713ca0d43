use crate::models::{
    Configuration, LogRecord, LogSource, ModeStats, ModuleRecord, StatusSnapshot,
};
use std::fmt;

/// Something the session loads from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Config,
    Modules,
    Logs,
    Status,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resource::Config => "config",
            Resource::Modules => "modules",
            Resource::Logs => "logs",
            Resource::Status => "status",
        };
        f.write_str(s)
    }
}

/// One in-flight flag per resource. Flags are independent of each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    pub config: bool,
    pub modules: bool,
    pub logs: bool,
    pub status: bool,
}

impl LoadingFlags {
    pub fn get(&self, resource: Resource) -> bool {
        match resource {
            Resource::Config => self.config,
            Resource::Modules => self.modules,
            Resource::Logs => self.logs,
            Resource::Status => self.status,
        }
    }

    pub fn set(&mut self, resource: Resource, loading: bool) {
        match resource {
            Resource::Config => self.config = loading,
            Resource::Modules => self.modules = loading,
            Resource::Logs => self.logs = loading,
            Resource::Status => self.status = loading,
        }
    }

    pub fn any(&self) -> bool {
        self.config || self.modules || self.logs || self.status
    }
}

/// Save-in-progress flags; only config and modules are ever written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SavingFlags {
    pub config: bool,
    pub modules: bool,
}

/// Override files whose last read failed for a reason other than being absent.
///
/// Their contents are unknown, so they must not be rewritten from the current
/// module list until a later scan reads them successfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadOverrides {
    pub modes: bool,
    pub rules: bool,
}

impl UnreadOverrides {
    pub fn any(&self) -> bool {
        self.modes || self.rules
    }
}

/// Everything the UI renders, owned by [`Session`](crate::state::Session).
///
/// Values are replaced wholesale by session operations; derived figures such
/// as [`mode_stats`](Self::mode_stats) are recomputed on each call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub config: Configuration,
    pub modules: Vec<ModuleRecord>,
    pub logs: Vec<LogRecord>,
    pub status: StatusSnapshot,
    pub log_source: LogSource,

    pub loading: LoadingFlags,
    pub saving: SavingFlags,
    pub unread_overrides: UnreadOverrides,
}

impl SessionState {
    pub fn mode_stats(&self) -> ModeStats {
        ModeStats::from_modules(&self.modules)
    }

    /// True while any load or save is running
    pub fn is_busy(&self) -> bool {
        self.loading.any() || self.saving.config || self.saving.modules
    }

    pub fn module(&self, id: &str) -> Option<&ModuleRecord> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub fn module_mut(&mut self, id: &str) -> Option<&mut ModuleRecord> {
        self.modules.iter_mut().find(|m| m.id == id)
    }

    /// Modules the daemon currently mounts through HymoFS
    pub fn active_modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules
            .iter()
            .filter(|m| self.status.is_module_active(&m.id))
    }
}
