//! Shell command text sent over the command channel.
//!
//! Every command the session issues is built here so that quoting is done in
//! one place. The channel executes the text as-is.

use camino::Utf8Path;

/// Two-line probe for kernel release and SELinux mode
pub const SYSTEM_PROBE: &str = r#"echo "KERNEL:$(uname -r)"; echo "SELINUX:$(getenforce)""#;

/// Escape text for embedding inside a single-quoted shell string.
pub fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', r"'\''")
}

/// Wrap `text` as one single-quoted shell word.
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", escape_single_quotes(text))
}

/// Read a whole file; fails with non-zero status if it does not exist.
pub fn read_file(path: &Utf8Path) -> String {
    format!("cat {}", shell_quote(path.as_str()))
}

/// Read a file that may legitimately be absent.
///
/// A missing file succeeds with empty output; any other read failure keeps
/// its non-zero status.
pub fn read_optional_file(path: &Utf8Path) -> String {
    let path = shell_quote(path.as_str());
    format!("if [ -f {path} ]; then cat {path}; fi", path = path)
}

/// Write `content` to `path`, creating the parent directory first.
///
/// `printf` appends the final newline, so a trailing newline in `content` is
/// dropped to keep the file ending in exactly one.
pub fn write_file(path: &Utf8Path, content: &str) -> String {
    let body = content.strip_suffix('\n').unwrap_or(content);
    format!(
        "mkdir -p \"$(dirname {path})\" && printf '%s\\n' {data} > {path}",
        path = shell_quote(path.as_str()),
        data = shell_quote(body)
    )
}

/// Ask the daemon for its module inventory (JSON)
pub fn scan_modules(binary: &Utf8Path) -> String {
    format!("{} modules", shell_quote(binary.as_str()))
}

/// Ask the daemon for storage usage (JSON)
pub fn storage_usage(binary: &Utf8Path) -> String {
    format!("{} storage", shell_quote(binary.as_str()))
}

/// Last `lines` lines of a log file, or nothing if the file is missing
pub fn tail_log(path: &Utf8Path, lines: usize) -> String {
    format!(
        "[ -f {path} ] && tail -n {lines} {path} || echo \"\"",
        path = shell_quote(path.as_str()),
        lines = lines
    )
}

/// Last `lines` kernel ring buffer lines mentioning `tag`
pub fn kernel_log(tag: &str, lines: usize) -> String {
    format!(
        "dmesg | grep -i '{}' | tail -n {}",
        escape_single_quotes(tag),
        lines
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_single_quotes() {
        assert_eq!(escape_single_quotes("plain"), "plain");
        assert_eq!(escape_single_quotes("it's"), r"it'\''s");
        assert_eq!(escape_single_quotes("''"), r"'\'''\''");
    }

    #[test]
    fn test_write_file_quotes_payload() {
        let cmd = write_file(Utf8Path::new("/data/adb/hymo/module_mode.conf"), "a='b'\n");
        assert_eq!(
            cmd,
            r#"mkdir -p "$(dirname '/data/adb/hymo/module_mode.conf')" && printf '%s\n' 'a='\''b'\''' > '/data/adb/hymo/module_mode.conf'"#
        );
    }

    #[test]
    fn test_paths_cannot_break_out_of_quotes() {
        let path = Utf8Path::new("/data/$(reboot)/`id`/\"x\"/it's.log");
        let quoted = r#"'/data/$(reboot)/`id`/"x"/it'\''s.log'"#;

        assert_eq!(read_file(path), format!("cat {}", quoted));
        assert_eq!(
            tail_log(path, 5),
            format!("[ -f {q} ] && tail -n 5 {q} || echo \"\"", q = quoted)
        );
        assert!(write_file(path, "x").ends_with(&format!("> {}", quoted)));
    }

    #[test]
    fn test_read_and_probe_commands() {
        assert_eq!(
            read_file(Utf8Path::new("/data/adb/hymo/config.toml")),
            "cat '/data/adb/hymo/config.toml'"
        );
        assert_eq!(
            read_optional_file(Utf8Path::new("/data/adb/hymo/module_rules.conf")),
            "if [ -f '/data/adb/hymo/module_rules.conf' ]; then cat '/data/adb/hymo/module_rules.conf'; fi"
        );
        assert_eq!(
            scan_modules(Utf8Path::new("/data/adb/modules/hymo/hymo")),
            "'/data/adb/modules/hymo/hymo' modules"
        );
        assert!(tail_log(Utf8Path::new("/tmp/d.log"), 50).contains("tail -n 50 '/tmp/d.log'"));
        assert_eq!(
            kernel_log("hymofs", 10),
            "dmesg | grep -i 'hymofs' | tail -n 10"
        );
    }
}
