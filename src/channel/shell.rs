use super::{ChannelError, CommandChannel, CommandOutput};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

/// Runs commands through a local shell.
///
/// On a device this is typically `su` or a root shell; the channel itself adds
/// no quoting and no timeout.
#[derive(Debug, Clone)]
pub struct ShellChannel {
    shell: String,
}

impl ShellChannel {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellChannel {
    fn default() -> Self {
        Self::new("sh")
    }
}

#[async_trait]
impl CommandChannel for ShellChannel {
    async fn run(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        tracing::debug!("Executing: {}", command);
        let start = Instant::now();

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ChannelError::Spawn {
                shell: self.shell.clone(),
                source,
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(ChannelError::Wait)?;

        // Killed by a signal has no exit code
        let status = output.status.code().unwrap_or(-1);

        tracing::debug!(
            "Command completed in {:.2}s with exit code {}",
            start.elapsed().as_secs_f32(),
            status
        );

        Ok(CommandOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
