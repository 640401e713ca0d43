//! Hymo State - command-line front end for the Hymo mount daemon.
//!
//! Drives one [`Session`] against the configured command channel and prints
//! the result of each operation.
//!
//! # Execution Flow
//!
//! 1. Parse arguments
//! 2. Initialize logging → `<log dir>/hymo-state.<date>`
//! 3. Load `AppSettings` (YAML file, then `HYMO_*` environment)
//! 4. Build the command channel (`shell` or `mock` backend)
//! 5. Run the requested subcommand on a tokio runtime
//!
//! Notices posted by the session while a command runs are printed to stderr.

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use hymo_state::config::{Backend, PreferenceStore, SettingsManager, YamlPreferences};
use hymo_state::models::ModuleMode;
use hymo_state::services::config_codec;
use hymo_state::{APP_NAME, LogSource, NoticeLevel, Session, StateChange, VERSION, channel};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Inspect and configure the Hymo mount daemon
#[derive(Parser)]
#[command(name = "hymo-state")]
#[command(about = "Hymo daemon configuration and module state", long_about = None)]
#[command(version)]
struct Cli {
    /// Client settings file (YAML)
    #[arg(long, global = true, default_value = "hymo-state.yaml")]
    settings: Utf8PathBuf,

    /// Use the simulated device instead of a shell
    #[arg(long, global = true)]
    mock: bool,

    /// Debug logging, also echoed to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: Utf8PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Storage, kernel and mount status
    Status,

    /// Installed modules with their mount modes
    Modules,

    /// Recent log lines
    Logs {
        /// Read the kernel ring buffer instead of the daemon log
        #[arg(long)]
        kernel: bool,
    },

    /// Print the daemon configuration
    Config,

    /// Change a module's mount mode and save it
    SetMode {
        /// Module id
        id: String,

        /// auto, overlay or magic
        mode: ModuleMode,
    },
}

fn print_notices(rx: &mut broadcast::Receiver<StateChange>) {
    loop {
        match rx.try_recv() {
            Ok(StateChange::Notice { level, message }) => match level {
                NoticeLevel::Error => eprintln!("error: {}", message),
                NoticeLevel::Info => tracing::debug!("{}", message),
            },
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

async fn show_status(session: &Session) {
    session.load_status().await;

    let state = session.snapshot();
    let storage = &state.status.storage;
    let system = &state.status.system;

    println!(
        "Storage:    {} used of {} ({} free, {}){}",
        storage.used,
        storage.size,
        storage.avail,
        storage.percent,
        storage
            .fs_type
            .as_deref()
            .map(|t| format!(" [{}]", t))
            .unwrap_or_default()
    );
    println!("Kernel:     {}", system.kernel);
    println!("SELinux:    {}", system.selinux);
    println!("Mount base: {}", system.mount_base);
    println!("Partitions: {}", system.active_partitions.join(", "));

    let stats = state.mode_stats();
    println!(
        "Modules:    {} total ({} auto, {} overlay, {} magic), {} via HymoFS",
        stats.total(),
        stats.auto,
        stats.overlay,
        stats.magic,
        state.active_modules().count()
    );

    if let Some(mismatch) = &system.mismatch {
        println!("Protocol mismatch: {}", mismatch.message);
    }
}

async fn show_modules(session: &Session) {
    session.load_modules().await;

    session.read(|state| {
        for module in &state.modules {
            println!(
                "{:<28} {:<8} {:<8} {} {}",
                module.id, module.mode, module.strategy, module.name, module.version
            );
            for rule in &module.rules {
                println!("    {} -> {}", rule.path, rule.mode);
            }
        }
    });
}

async fn show_logs(session: &Session, kernel: bool) {
    session.load_config().await;

    let source = if kernel {
        LogSource::Kernel
    } else {
        LogSource::Daemon
    };
    session.set_log_source(source).await;

    session.read(|state| {
        for record in &state.logs {
            println!("[{}] {}", record.level, record.text);
        }
    });
}

async fn run(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Status => show_status(session).await,
        Commands::Modules => show_modules(session).await,
        Commands::Logs { kernel } => show_logs(session, kernel).await,
        Commands::Config => {
            session.load_config().await;
            let config = session.read(|state| state.config.clone());
            print!("{}", config_codec::serialize(&config));
        }
        Commands::SetMode { id, mode } => {
            session.load_modules().await;
            if !session.set_module_mode(&id, mode) {
                bail!("No module with id '{}'", id);
            }
            session.save_modules().await?;
            println!("{} -> {}", id, mode);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard =
        hymo_state::logging::setup_logging(&cli.log_dir, "hymo-state", cli.verbose, cli.verbose)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let settings_manager = SettingsManager::new(&cli.settings);
    let mut settings = settings_manager.load()?;
    if cli.mock {
        settings.backend = Backend::Mock;
    }

    let preferences_path = cli.settings.with_file_name("hymo-state-preferences.yaml");
    let preferences: Arc<dyn PreferenceStore> = Arc::new(
        YamlPreferences::open(&preferences_path)
            .with_context(|| format!("Failed to open preferences: {}", preferences_path))?,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("hymo-worker")
        .build()?;

    let channel = channel::from_settings(&settings);
    let session = Session::new(channel, settings, preferences);
    let mut notices = session.subscribe();

    let result = runtime.block_on(run(&session, cli.command));
    print_notices(&mut notices);

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result
}
