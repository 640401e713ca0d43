// Session state module
//
// The Session owns the live SessionState behind Arc<RwLock<T>>, runs every
// load/save through the command channel, and emits change events for the UI.

use crate::channel::{ChannelError, CommandChannel, CommandOutput};
use crate::config::{AppSettings, PreferenceStore};
use crate::models::configuration::DEFAULT_LOG_FILE;
use crate::models::{
    Configuration, LogLevel, LogRecord, LogSource, ModuleMode, Resource, Rule, SessionState,
    StatusSnapshot, UnreadOverrides,
};
use crate::services::{
    Reading, SystemReading, aggregate, classify, commands, config_codec, reconciler,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

/// Preference key for the selected log source
pub const LOG_SOURCE_KEY: &str = "log_source";

/// Severity of a user-facing notice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Change events emitted when session state is modified
///
/// Computed by diffing the state before and after each mutation, plus
/// [`Notice`](StateChange::Notice) events for user-facing messages.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A resource started or finished loading
    LoadingChanged { resource: Resource, loading: bool },

    /// A save started or finished
    SavingChanged { resource: Resource, saving: bool },

    /// The configuration was replaced or edited
    ConfigChanged,

    /// The module list was replaced or edited
    ModulesChanged { count: usize },

    /// The log list was replaced
    LogsChanged { count: usize },

    /// A new status snapshot is available
    StatusChanged,

    /// The log source selection changed
    LogSourceChanged { source: LogSource },

    /// Non-fatal message for the user
    Notice { level: NoticeLevel, message: String },
}

/// A save whose channel write failed. In-memory state is left as edited.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("failed to save config: {0}")]
    SaveConfig(String),

    #[error("failed to save modes: {0}")]
    SaveModes(String),

    #[error("failed to save rules: {0}")]
    SaveRules(String),
}

const UNREAD_OVERRIDES_DETAIL: &str =
    "stored overrides could not be read, reload modules before saving";

/// Stdout of an override file read, or `None` if the read failed
fn override_text<'a>(what: &str, result: &'a Reading) -> Option<&'a str> {
    match failure_detail(result) {
        None => Some(
            result
                .as_ref()
                .map(|output| output.stdout.as_str())
                .unwrap_or_default(),
        ),
        Some(detail) => {
            tracing::warn!("Failed to read {} overrides: {}", what, detail);
            None
        }
    }
}

/// Describe why a channel call did not succeed, or `None` if it did
fn failure_detail(result: &Result<CommandOutput, ChannelError>) -> Option<String> {
    match result {
        Ok(output) if output.success() => None,
        Ok(output) => {
            let stderr = output.stderr.trim();
            Some(if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr.to_string()
            })
        }
        Err(e) => Some(e.to_string()),
    }
}

/// Orchestrates loads and saves against the command channel.
///
/// There is a single logical mutator: every operation reads what it needs,
/// awaits the channel without holding the lock, then replaces whole fields in
/// one [`update`](Self::update). Each resource has its own loading flag;
/// callers are expected not to start a second load of a resource that is
/// already loading.
///
/// # Usage
///
/// - [`read()`](Self::read) / [`snapshot()`](Self::snapshot) for reading state
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
pub struct Session {
    channel: Arc<dyn CommandChannel>,
    settings: Arc<AppSettings>,
    preferences: Arc<dyn PreferenceStore>,

    state: Arc<RwLock<SessionState>>,

    /// Broadcast channel for state change events
    state_tx: broadcast::Sender<StateChange>,
}

impl Session {
    /// Create a session with default state.
    ///
    /// The log source is restored from `preferences` if one was saved.
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        settings: AppSettings,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        let (state_tx, _) = broadcast::channel(100);

        let log_source = preferences
            .restore(LOG_SOURCE_KEY)
            .and_then(|value| LogSource::from_preference(&value))
            .unwrap_or_default();

        let state = SessionState {
            log_source,
            ..SessionState::default()
        };

        Self {
            channel,
            settings: Arc::new(settings),
            preferences,
            state: Arc::new(RwLock::new(state)),
            state_tx,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Clone of the entire current state
    pub fn snapshot(&self) -> SessionState {
        self.read(SessionState::clone)
    }

    /// Execute a function with read access to the state
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Mutate the state and emit the resulting change events
    ///
    /// # Returns
    /// The StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut SessionState),
    {
        let changes = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let old_state = state.clone();
            update_fn(&mut state);
            detect_changes(&old_state, &state)
        };

        for change in &changes {
            // Nobody listening is fine
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.state_tx.send(StateChange::Notice {
            level,
            message: message.into(),
        });
    }

    fn set_loading(&self, resource: Resource, loading: bool) {
        self.update(|state| state.loading.set(resource, loading));
    }

    async fn run(&self, command: &str) -> Reading {
        self.channel.run(command).await
    }

    /// Write `content` to `path` on the device, returning the failure detail
    async fn write_file(&self, path: &Utf8Path, content: &str) -> Option<String> {
        let result = self.run(&commands::write_file(path, content)).await;
        failure_detail(&result)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Read the daemon configuration and replace the in-memory copy.
    ///
    /// A failed read falls back to defaults and posts an error notice.
    pub async fn load_config(&self) {
        self.set_loading(Resource::Config, true);

        let result = self.run(&commands::read_file(&self.settings.config_path)).await;

        let config = match failure_detail(&result) {
            None => {
                let text = result.map(|o| o.stdout).unwrap_or_default();
                let config = config_codec::parse(&text);
                tracing::info!("Loaded config from {}", self.settings.config_path);
                self.notify(NoticeLevel::Info, "Configuration loaded");
                config
            }
            Some(detail) => {
                tracing::warn!("Failed to load config, using defaults: {}", detail);
                self.notify(
                    NoticeLevel::Error,
                    "Failed to load configuration, using defaults",
                );
                Configuration::default()
            }
        };

        self.update(|state| {
            state.config = config;
            state.loading.config = false;
        });
    }

    /// Write the current configuration to the device.
    ///
    /// On failure the in-memory configuration is left untouched.
    pub async fn save_config(&self) -> Result<(), SessionError> {
        self.update(|state| state.saving.config = true);
        let config = self.read(|state| state.config.clone());

        let text = config_codec::serialize(&config);
        let failure = self.write_file(&self.settings.config_path, &text).await;

        self.update(|state| state.saving.config = false);

        match failure {
            None => {
                tracing::info!("Saved config to {}", self.settings.config_path);
                self.notify(NoticeLevel::Info, "Configuration saved");
                Ok(())
            }
            Some(detail) => {
                let err = SessionError::SaveConfig(detail);
                tracing::error!("{}", err);
                self.notify(NoticeLevel::Error, err.to_string());
                Err(err)
            }
        }
    }

    /// Edit the configuration in place
    pub fn update_config<F>(&self, edit: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut Configuration),
    {
        self.update(|state| edit(&mut state.config))
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    /// Scan modules and merge them with the stored mode and rule overrides.
    pub async fn load_modules(&self) {
        self.set_loading(Resource::Modules, true);

        let scan_cmd = commands::scan_modules(&self.settings.binary_path);
        let modes_cmd = commands::read_optional_file(&self.settings.mode_config_path);
        let rules_cmd = commands::read_optional_file(&self.settings.rules_config_path);

        let (scan, modes, rules) = tokio::join!(
            self.run(&scan_cmd),
            self.run(&modes_cmd),
            self.run(&rules_cmd)
        );

        // An absent file reads as empty; anything else that fails leaves the
        // stored overrides unknown
        let mode_text = override_text("mode", &modes);
        let rule_text = override_text("rule", &rules);
        let unread = UnreadOverrides {
            modes: mode_text.is_none(),
            rules: rule_text.is_none(),
        };
        if unread.any() {
            self.notify(NoticeLevel::Error, "Failed to read stored module overrides");
        }

        let mode_overrides = mode_text
            .map(reconciler::parse_mode_overrides)
            .unwrap_or_default();
        let rule_overrides = rule_text
            .map(reconciler::parse_rule_overrides)
            .unwrap_or_default();

        let raw_modules = match failure_detail(&scan) {
            None => {
                let stdout = scan.map(|o| o.stdout).unwrap_or_default();
                match reconciler::parse_inventory(&stdout) {
                    Ok(raw) => Some(raw),
                    Err(e) => {
                        tracing::warn!("Module scan returned unusable output: {}", e);
                        None
                    }
                }
            }
            Some(detail) => {
                tracing::warn!("Module scan failed: {}", detail);
                None
            }
        };

        let modules = match raw_modules {
            Some(raw) => reconciler::reconcile(raw, &mode_overrides, &rule_overrides),
            None => {
                self.notify(NoticeLevel::Error, "Failed to scan modules");
                Vec::new()
            }
        };

        tracing::info!(
            "Loaded {} modules ({} mode overrides, {} rule overrides)",
            modules.len(),
            mode_overrides.len(),
            rule_overrides.len()
        );

        self.update(|state| {
            state.modules = modules;
            state.unread_overrides = unread;
            state.loading.modules = false;
        });
    }

    /// Persist mode and rule overrides for the current module list.
    ///
    /// Both files are written even if one fails; a failed write does not roll
    /// back the other. A mode failure is reported in preference to a rule
    /// failure. A file whose last read failed is left untouched and reported
    /// as failed until [`load_modules`](Self::load_modules) reads it again.
    pub async fn save_modules(&self) -> Result<(), SessionError> {
        self.update(|state| state.saving.modules = true);
        let (modules, unread) =
            self.read(|state| (state.modules.clone(), state.unread_overrides));

        let modes = reconciler::render_mode_overrides(&reconciler::extract_modes(&modules));
        let rules = reconciler::render_rule_overrides(&reconciler::extract_rules(&modules));

        let (modes_failure, rules_failure) = tokio::join!(
            async {
                if unread.modes {
                    return Some(UNREAD_OVERRIDES_DETAIL.to_string());
                }
                self.write_file(&self.settings.mode_config_path, &modes).await
            },
            async {
                if unread.rules {
                    return Some(UNREAD_OVERRIDES_DETAIL.to_string());
                }
                self.write_file(&self.settings.rules_config_path, &rules).await
            }
        );

        self.update(|state| state.saving.modules = false);

        let mut first_error = None;
        if let Some(detail) = modes_failure {
            let err = SessionError::SaveModes(detail);
            tracing::error!("{}", err);
            self.notify(NoticeLevel::Error, err.to_string());
            first_error = Some(err);
        }
        if let Some(detail) = rules_failure {
            let err = SessionError::SaveRules(detail);
            tracing::error!("{}", err);
            self.notify(NoticeLevel::Error, err.to_string());
            first_error.get_or_insert(err);
        }

        match first_error {
            None => {
                tracing::info!("Saved overrides for {} modules", modules.len());
                self.notify(NoticeLevel::Info, "Module settings saved");
                Ok(())
            }
            Some(err) => Err(err),
        }
    }

    /// Change one module's mode. Returns false if no such module is loaded.
    pub fn set_module_mode(&self, id: &str, mode: ModuleMode) -> bool {
        let mut found = false;
        self.update(|state| {
            if let Some(module) = state.module_mut(id) {
                module.mode = mode;
                found = true;
            }
        });
        found
    }

    /// Replace one module's rules. Returns false if no such module is loaded.
    pub fn set_module_rules(&self, id: &str, rules: Vec<Rule>) -> bool {
        let mut found = false;
        self.update(|state| {
            if let Some(module) = state.module_mut(id) {
                module.rules = rules;
                found = true;
            }
        });
        found
    }

    // ------------------------------------------------------------------
    // Logs
    // ------------------------------------------------------------------

    fn log_command(&self, source: LogSource, config: &Configuration) -> String {
        match source {
            LogSource::Daemon => {
                let path = if config.logfile.as_str().is_empty() {
                    Utf8PathBuf::from(DEFAULT_LOG_FILE)
                } else {
                    config.logfile.clone()
                };
                commands::tail_log(&path, self.settings.log_lines)
            }
            LogSource::Kernel => {
                commands::kernel_log(&self.settings.kernel_log_tag, self.settings.log_lines)
            }
        }
    }

    /// Fetch and classify logs from the selected source.
    ///
    /// With `silent` set (polling), the loading flag is not touched, the
    /// current list stays visible until replaced, and failures post no notice.
    pub async fn load_logs(&self, silent: bool) {
        let (source, config) = self.read(|state| (state.log_source, state.config.clone()));

        if !silent {
            self.update(|state| {
                state.loading.logs = true;
                state.logs.clear();
            });
        }

        let result = self.run(&self.log_command(source, &config)).await;

        let logs = match failure_detail(&result) {
            None => classify(&result.map(|o| o.stdout).unwrap_or_default()),
            Some(detail) => {
                tracing::warn!("Failed to read {} logs: {}", source.as_str(), detail);
                if !silent {
                    self.notify(NoticeLevel::Error, "Failed to read logs");
                }
                vec![LogRecord::new(format!("Error: {}", detail), LogLevel::Error)]
            }
        };

        self.update(|state| {
            state.logs = logs;
            if !silent {
                state.loading.logs = false;
            }
        });
    }

    /// Switch log source, remember the choice, and reload logs
    pub async fn set_log_source(&self, source: LogSource) {
        self.update(|state| state.log_source = source);

        if let Err(e) = self.preferences.persist(LOG_SOURCE_KEY, source.as_str()) {
            tracing::warn!("Failed to persist log source: {:#}", e);
        }

        self.load_logs(false).await;
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Refresh the status snapshot.
    ///
    /// Storage and system probes run concurrently. If no modules are loaded
    /// afterwards, a module scan follows so status always has module context.
    pub async fn load_status(&self) {
        self.set_loading(Resource::Status, true);

        let storage_cmd = commands::storage_usage(&self.settings.binary_path);
        let state_cmd = commands::read_file(&self.settings.daemon_state_path);

        let (storage, system) = tokio::join!(self.run(&storage_cmd), async {
            let (identity, daemon_state) =
                tokio::join!(self.run(commands::SYSTEM_PROBE), self.run(&state_cmd));
            SystemReading {
                identity,
                daemon_state,
            }
        });

        let snapshot: StatusSnapshot = aggregate(&storage, &system);

        self.update(|state| {
            state.status = snapshot;
            state.loading.status = false;
        });

        if self.read(|state| state.modules.is_empty()) {
            tracing::debug!("No modules loaded, scanning for status view");
            self.load_modules().await;
        }
    }
}

/// Detect what changed between two states and generate events
fn detect_changes(old: &SessionState, new: &SessionState) -> Vec<StateChange> {
    let mut changes = Vec::new();

    for resource in [
        Resource::Config,
        Resource::Modules,
        Resource::Logs,
        Resource::Status,
    ] {
        let loading = new.loading.get(resource);
        if old.loading.get(resource) != loading {
            changes.push(StateChange::LoadingChanged { resource, loading });
        }
    }

    if old.saving.config != new.saving.config {
        changes.push(StateChange::SavingChanged {
            resource: Resource::Config,
            saving: new.saving.config,
        });
    }
    if old.saving.modules != new.saving.modules {
        changes.push(StateChange::SavingChanged {
            resource: Resource::Modules,
            saving: new.saving.modules,
        });
    }

    if old.config != new.config {
        changes.push(StateChange::ConfigChanged);
    }

    if old.modules != new.modules {
        changes.push(StateChange::ModulesChanged {
            count: new.modules.len(),
        });
    }

    if old.logs != new.logs {
        changes.push(StateChange::LogsChanged {
            count: new.logs.len(),
        });
    }

    if old.status != new.status {
        changes.push(StateChange::StatusChanged);
    }

    if old.log_source != new.log_source {
        changes.push(StateChange::LogSourceChanged {
            source: new.log_source,
        });
    }

    changes
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            settings: Arc::clone(&self.settings),
            preferences: Arc::clone(&self.preferences),
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockCommandChannel;
    use crate::config::MemoryPreferences;
    use crate::models::ModuleRecord;

    fn session_with(channel: MockCommandChannel) -> Session {
        Session::new(
            Arc::new(channel),
            AppSettings::default(),
            Arc::new(MemoryPreferences::new()),
        )
    }

    fn drain(rx: &mut broadcast::Receiver<StateChange>) -> Vec<StateChange> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn error_notices(events: &[StateChange]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                StateChange::Notice {
                    level: NoticeLevel::Error,
                    message,
                } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = session_with(MockCommandChannel::new());
        let state = session.snapshot();
        assert!(!state.is_busy());
        assert_eq!(state.log_source, LogSource::Daemon);
    }

    #[test]
    fn test_log_source_restored_from_preferences() {
        let preferences = MemoryPreferences::new();
        preferences.persist(LOG_SOURCE_KEY, "kernel").unwrap();

        let session = Session::new(
            Arc::new(MockCommandChannel::new()),
            AppSettings::default(),
            Arc::new(preferences),
        );
        assert_eq!(session.read(|s| s.log_source), LogSource::Kernel);
    }

    #[test]
    fn test_update_emits_diffed_events() {
        let session = session_with(MockCommandChannel::new());
        let mut rx = session.subscribe();

        let changes = session.update(|s| {
            s.modules = vec![ModuleRecord::new("a"), ModuleRecord::new("b")];
            s.loading.modules = true;
        });

        assert_eq!(
            changes,
            vec![
                StateChange::LoadingChanged {
                    resource: Resource::Modules,
                    loading: true
                },
                StateChange::ModulesChanged { count: 2 },
            ]
        );
        assert_eq!(drain(&mut rx), changes);

        // No-op update emits nothing
        assert!(session.update(|_| {}).is_empty());
    }

    #[test]
    fn test_set_module_mode_unknown_id() {
        let session = session_with(MockCommandChannel::new());
        session.update(|s| s.modules = vec![ModuleRecord::new("a")]);

        assert!(session.set_module_mode("a", ModuleMode::Magic));
        assert!(!session.set_module_mode("missing", ModuleMode::Magic));
        assert_eq!(session.read(|s| s.mode_stats().magic), 1);
    }

    #[tokio::test]
    async fn test_load_config_failure_uses_defaults() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_run()
            .returning(|_| Ok(CommandOutput::failed(1, "No such file or directory")));

        let session = session_with(channel);
        session.update_config(|c| c.verbose = true);
        let mut rx = session.subscribe();

        session.load_config().await;

        let state = session.snapshot();
        assert_eq!(state.config, Configuration::default());
        assert!(!state.loading.config);
        assert_eq!(error_notices(&drain(&mut rx)).len(), 1);
    }

    #[tokio::test]
    async fn test_save_config_failure_keeps_edits() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_run()
            .times(1)
            .returning(|_| Ok(CommandOutput::failed(1, "Read-only file system")));

        let session = session_with(channel);
        session.update_config(|c| {
            c.verbose = true;
            c.add_partition("my_product");
        });
        let before = session.read(|s| s.config.clone());
        let mut rx = session.subscribe();

        let err = session.save_config().await.unwrap_err();

        assert_eq!(
            err,
            SessionError::SaveConfig("Read-only file system".to_string())
        );
        assert_eq!(session.read(|s| s.config.clone()), before);
        assert!(!session.read(|s| s.saving.config));
        assert_eq!(
            error_notices(&drain(&mut rx)),
            vec!["failed to save config: Read-only file system".to_string()]
        );
    }

    #[tokio::test]
    async fn test_save_modules_rules_failure_only() {
        let settings = AppSettings::default();
        let rules_path = settings.rules_config_path.to_string();

        let mut channel = MockCommandChannel::new();
        channel.expect_run().times(2).returning(move |command| {
            if command.contains(&rules_path) {
                Ok(CommandOutput::failed(1, "disk full"))
            } else {
                Ok(CommandOutput::ok(""))
            }
        });

        let session = session_with(channel);
        let mut module = ModuleRecord::new("a");
        module.mode = ModuleMode::Overlay;
        module.rules = vec![Rule::new("system/app", "magic")];
        session.update(|s| s.modules = vec![module]);

        let err = session.save_modules().await.unwrap_err();
        assert_eq!(err, SessionError::SaveRules("disk full".to_string()));
        assert_eq!(err.to_string(), "failed to save rules: disk full");
        assert!(!session.read(|s| s.saving.modules));
    }

    #[tokio::test]
    async fn test_save_modules_mode_failure_wins() {
        let mut channel = MockCommandChannel::new();
        channel.expect_run().times(2).returning(|_| {
            Err(ChannelError::Unavailable("root denied".to_string()))
        });

        let session = session_with(channel);
        let err = session.save_modules().await.unwrap_err();
        assert!(matches!(err, SessionError::SaveModes(_)));
    }

    #[tokio::test]
    async fn test_silent_log_failure_posts_no_notice() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_run()
            .returning(|_| Ok(CommandOutput::failed(2, "permission denied")));

        let session = session_with(channel);
        let mut rx = session.subscribe();

        session.load_logs(true).await;

        let logs = session.read(|s| s.logs.clone());
        assert_eq!(
            logs,
            vec![LogRecord::new("Error: permission denied", LogLevel::Error)]
        );
        let events = drain(&mut rx);
        assert!(error_notices(&events).is_empty());
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, StateChange::LoadingChanged { .. }))
        );
    }

    #[tokio::test]
    async fn test_daemon_logs_use_default_path_when_unset() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_run()
            .withf(|command| command.contains(DEFAULT_LOG_FILE) && command.contains("tail -n"))
            .times(1)
            .returning(|_| Ok(CommandOutput::ok("[ERROR] boom\n")));

        let session = session_with(channel);
        session.update_config(|c| c.logfile = Utf8PathBuf::new());
        assert!(session.read(|s| s.config.logfile.as_str().is_empty()));
        session.load_logs(false).await;

        let logs = session.read(|s| s.logs.clone());
        assert_eq!(logs, vec![LogRecord::new("[ERROR] boom", LogLevel::Error)]);
    }

    #[tokio::test]
    async fn test_override_read_error_keeps_file_from_being_overwritten() {
        let settings = AppSettings::default();
        let modes_path = settings.mode_config_path.to_string();
        let scan = commands::scan_modules(&settings.binary_path);
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut channel = MockCommandChannel::new();
        let log = Arc::clone(&calls);
        channel.expect_run().returning(move |command| {
            log.lock().unwrap().push(command.to_string());
            if command == scan {
                Ok(CommandOutput::ok(r#"[{"id":"a","mode":"magic"}]"#))
            } else if command.starts_with("if [ -f") && command.contains(&modes_path) {
                Err(ChannelError::Unavailable("su timed out".to_string()))
            } else {
                Ok(CommandOutput::ok(""))
            }
        });

        let session = session_with(channel);
        let mut rx = session.subscribe();
        session.load_modules().await;

        assert_eq!(session.read(|s| s.module("a").unwrap().mode), ModuleMode::Magic);
        assert_eq!(
            session.read(|s| s.unread_overrides),
            UnreadOverrides {
                modes: true,
                rules: false
            }
        );
        assert_eq!(
            error_notices(&drain(&mut rx)),
            vec!["Failed to read stored module overrides".to_string()]
        );

        let err = session.save_modules().await.unwrap_err();
        assert!(matches!(err, SessionError::SaveModes(_)));

        let writes: Vec<String> = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("mkdir -p"))
            .cloned()
            .collect();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].contains(settings.rules_config_path.as_str()));
    }
}
