// Simulated device for development builds and tests.
//
// Understands the file reads and writes produced by `services::commands`
// (so a save followed by a load round-trips through the fake filesystem) and
// answers everything else from a table of canned outputs.

use super::{ChannelError, CommandChannel, CommandOutput};
use crate::config::AppSettings;
use crate::models::configuration::DEFAULT_LOG_FILE;
use crate::services::commands;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

/// One single-quoted shell word, as produced by `commands::shell_quote`
const QUOTED: &str = r"'(?:[^']|'\\'')*'";

fn quoted_pattern(template: &str) -> Regex {
    let pattern = template.replace("{q}", QUOTED).replace(
        "{path}",
        r"'(?P<path>(?:[^']|'\\'')+)'",
    );
    Regex::new(&pattern).expect("Invalid mock command regex")
}

static READ_PATTERN: LazyLock<Regex> = LazyLock::new(|| quoted_pattern(r"^cat {path}$"));

static OPTIONAL_READ_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| quoted_pattern(r"^if \[ -f {path} \]; then cat {q}; fi$"));

static WRITE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    quoted_pattern(r#"(?s)^mkdir -p "\$\(dirname {q}\)" && printf '%s\\n' '(?P<data>.*)' > {path}$"#)
});

static TAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    quoted_pattern(r#"^\[ -f {path} \] && tail -n (?P<lines>\d+) {q} \|\| echo ""$"#)
});

fn unescape(quoted: &str) -> String {
    quoted.replace(r"'\''", "'")
}

#[derive(Debug, Default)]
struct MockDevice {
    files: HashMap<String, String>,
    responses: HashMap<String, CommandOutput>,
    failing: Vec<String>,
    calls: Vec<String>,
}

impl MockDevice {
    fn execute(&mut self, command: &str) -> CommandOutput {
        if let Some(pattern) = self.failing.iter().find(|p| command.contains(p.as_str())) {
            return CommandOutput::failed(1, format!("simulated failure ({})", pattern));
        }

        if let Some(output) = self.responses.get(command) {
            return output.clone();
        }

        if let Some(caps) = WRITE_PATTERN.captures(command) {
            let data = unescape(&caps["data"]);
            self.files.insert(unescape(&caps["path"]), format!("{}\n", data));
            return CommandOutput::ok("");
        }

        if let Some(caps) = OPTIONAL_READ_PATTERN.captures(command) {
            let contents = self.files.get(&unescape(&caps["path"])).cloned();
            return CommandOutput::ok(contents.unwrap_or_default());
        }

        if let Some(caps) = READ_PATTERN.captures(command) {
            let path = unescape(&caps["path"]);
            return match self.files.get(&path) {
                Some(contents) => CommandOutput::ok(contents.clone()),
                None => CommandOutput::failed(1, format!("cat: {}: No such file or directory", path)),
            };
        }

        if let Some(caps) = TAIL_PATTERN.captures(command) {
            let lines: usize = caps["lines"].parse().unwrap_or(0);
            return match self.files.get(&unescape(&caps["path"])) {
                Some(contents) => {
                    let all: Vec<&str> = contents.lines().collect();
                    let tail = &all[all.len().saturating_sub(lines)..];
                    CommandOutput::ok(format!("{}\n", tail.join("\n")))
                }
                None => CommandOutput::ok("\n"),
            };
        }

        CommandOutput::failed(127, format!("sh: {}: command not found", command))
    }
}

/// In-memory stand-in for a device behind the command channel
#[derive(Debug, Default)]
pub struct MockChannel {
    device: Mutex<MockDevice>,
}

impl MockChannel {
    /// Empty device: no files, no canned responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Device populated with a plausible module set, config and logs
    pub fn device(settings: &AppSettings) -> Self {
        let channel = Self::new();

        channel.set_file(
            settings.config_path.as_str(),
            "# Hymo Configuration\n\
             moduledir = \"/data/adb/modules/\"\n\
             mountsource = \"KSU\"\n\
             logfile = \"/data/adb/hymo/daemon.log\"\n\
             verbose = true\n\
             force_ext4 = false\n\
             disable_umount = false\n\
             enable_nuke = false\n\
             ignore_protocol_mismatch = false\n\
             enable_kernel_debug = false\n\
             enable_stealth = false\n\
             partitions = \"my_product\"\n",
        );
        channel.set_file(
            settings.mode_config_path.as_str(),
            "# Module Modes\nzygisk_lsposed=magic\n",
        );
        channel.set_file(
            settings.rules_config_path.as_str(),
            "# Module Rules\nzygisk_lsposed:system/framework=magic\n",
        );
        channel.set_file(
            settings.daemon_state_path.as_str(),
            r#"{"mount_point":"/data/adb/hymo/img_mnt","active_mounts":["system","vendor"],"hymofs_module_ids":["viperfx"],"hymofs_mismatch":false,"mismatch_message":""}"#,
        );
        channel.set_file(
            DEFAULT_LOG_FILE,
            "[INFO] Hymo daemon starting\n\
             [INFO] Scanning /data/adb/modules/\n\
             [WARN] Module 'old_mod' has no content, skipping\n\
             [ERROR] Failed to mount vendor overlay: EBUSY\n\
             mounted 3 modules\n",
        );

        channel.respond(
            &commands::scan_modules(&settings.binary_path),
            CommandOutput::ok(
                r#"{"count":3,"modules":[
                    {"id":"zygisk_lsposed","name":"LSPosed","version":"v1.9.2","author":"LSPosed Developers","description":"Xposed framework","mode":"auto","strategy":"overlay","path":"/data/adb/modules/zygisk_lsposed"},
                    {"id":"viperfx","name":"ViPER4Android FX","version":"2.7.2.1","author":"ViPER520","description":"Audio effects","mode":"auto","strategy":"hymofs","path":"/data/adb/modules/viperfx"},
                    {"id":"systemless_hosts","name":"Systemless Hosts","version":"1.0","author":"KernelSU","mode":"overlay","strategy":"overlay","path":"/data/adb/modules/systemless_hosts"}
                ]}"#,
            ),
        );
        channel.respond(
            &commands::storage_usage(&settings.binary_path),
            CommandOutput::ok(
                r#"{ "size": "2.0G", "used": "412.5M", "avail": "1.6G", "percent": "20%", "type": "tmpfs" }"#,
            ),
        );
        channel.respond(
            commands::SYSTEM_PROBE,
            CommandOutput::ok("KERNEL:5.15.148-android14-11\nSELINUX:Enforcing\n"),
        );
        channel.respond(
            &commands::kernel_log(&settings.kernel_log_tag, settings.log_lines),
            CommandOutput::ok(
                "[   12.345678] hymofs: module loaded, protocol 10\n\
                 [   12.400000] hymofs: warning: redirect table nearly full\n",
            ),
        );

        channel
    }

    fn with_device<R>(&self, f: impl FnOnce(&mut MockDevice) -> R) -> R {
        let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut device)
    }

    pub fn set_file(&self, path: &str, contents: &str) {
        self.with_device(|d| {
            d.files.insert(path.to_string(), contents.to_string());
        });
    }

    pub fn remove_file(&self, path: &str) {
        self.with_device(|d| {
            d.files.remove(path);
        });
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.with_device(|d| d.files.get(path).cloned())
    }

    /// Answer `command` (exact match) with `output`
    pub fn respond(&self, command: &str, output: CommandOutput) {
        self.with_device(|d| {
            d.responses.insert(command.to_string(), output);
        });
    }

    /// Make every command containing `pattern` exit with status 1
    pub fn fail_matching(&self, pattern: &str) {
        self.with_device(|d| d.failing.push(pattern.to_string()));
    }

    pub fn clear_failures(&self) {
        self.with_device(|d| d.failing.clear());
    }

    /// Commands received so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.with_device(|d| d.calls.clone())
    }
}

#[async_trait]
impl CommandChannel for MockChannel {
    async fn run(&self, command: &str) -> Result<CommandOutput, ChannelError> {
        let output = self.with_device(|d| {
            d.calls.push(command.to_string());
            d.execute(command)
        });

        // Behave like a real round trip: give other tasks a chance to run
        tokio::task::yield_now().await;
        Ok(output)
    }
}
