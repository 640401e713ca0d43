//! Command-execution channel: "run this shell text, hand back status, stdout
//! and stderr".
//!
//! The session never touches the device directly. Everything goes through a
//! [`CommandChannel`], which has two implementations:
//!
//! - [`ShellChannel`]: spawns `<shell> -c <command>` on the device
//! - [`MockChannel`]: simulated device for development and tests
//!
//! [`from_settings`] picks one based on [`AppSettings::backend`].

pub mod mock;
pub mod shell;

pub use mock::MockChannel;
pub use shell::ShellChannel;

use crate::config::{AppSettings, Backend};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout if the command succeeded and printed something
    pub fn stdout_if_ok(&self) -> Option<&str> {
        (self.success() && !self.stdout.trim().is_empty()).then_some(self.stdout.as_str())
    }
}

/// Failure to run a command at all (as opposed to a non-zero exit status)
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to spawn {shell}: {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to collect command output: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Command channel unavailable: {0}")]
    Unavailable(String),
}

/// Anything that can execute a shell command and report its outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput, ChannelError>;
}

/// Build the channel selected in `settings`
pub fn from_settings(settings: &AppSettings) -> Arc<dyn CommandChannel> {
    match settings.backend {
        Backend::Shell => {
            tracing::info!("Using shell command channel ({})", settings.shell);
            Arc::new(ShellChannel::new(settings.shell.clone()))
        }
        Backend::Mock => {
            tracing::info!("Using simulated device command channel");
            Arc::new(MockChannel::device(settings))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdout_if_ok() {
        assert_eq!(CommandOutput::ok("hi").stdout_if_ok(), Some("hi"));
        assert_eq!(CommandOutput::ok("  \n").stdout_if_ok(), None);
        assert_eq!(CommandOutput::failed(1, "nope").stdout_if_ok(), None);
    }

    #[test]
    fn test_from_settings_mock_backend() {
        let settings = AppSettings {
            backend: Backend::Mock,
            ..AppSettings::default()
        };
        let channel = from_settings(&settings);
        let output = tokio_test::block_on(channel.run(crate::services::commands::SYSTEM_PROBE))
            .unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("KERNEL:"));
    }
}
