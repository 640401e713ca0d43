use crate::models::{LogLevel, LogRecord};

/// Tag the kernel side of the daemon prefixes its messages with
pub const DOMAIN_TAG: &str = "hymofs:";

/// Markers checked in priority order; the first hit decides the level.
const MARKERS: &[(&str, LogLevel)] = &[
    ("[ERROR]", LogLevel::Error),
    ("error:", LogLevel::Error),
    ("[WARN]", LogLevel::Warn),
    ("warning:", LogLevel::Warn),
    ("[INFO]", LogLevel::Info),
    (DOMAIN_TAG, LogLevel::Info),
];

/// Level of a single line (case-sensitive substring match)
pub fn classify_line(line: &str) -> LogLevel {
    MARKERS
        .iter()
        .find(|(marker, _)| line.contains(*marker))
        .map(|(_, level)| *level)
        .unwrap_or(LogLevel::Debug)
}

/// Split raw log text into classified records.
///
/// Accepts `\n`, `\r\n` and bare `\r` line endings. Blank input produces a
/// single placeholder record so there is always something to show.
pub fn classify(raw: &str) -> Vec<LogRecord> {
    if raw.trim().is_empty() {
        return vec![LogRecord::empty()];
    }

    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let body = normalized.strip_suffix('\n').unwrap_or(&normalized);

    body.split('\n')
        .map(|line| LogRecord::new(line, classify_line(line)))
        .collect()
}
