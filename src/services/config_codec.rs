//! Reads and writes the daemon's `key = value` configuration file.
//!
//! The format is TOML-like but deliberately parsed by hand: the daemon's own
//! parser only understands one directive per line, so anything richer would
//! not survive a round trip anyway.
//!
//! ```text
//! # Hymo Configuration
//! moduledir = "/data/adb/modules/"
//! mountsource = "KSU"
//! verbose = false
//! partitions = "my_product,odm_dlkm"
//! ```
//!
//! Parsing never fails. Unknown keys and lines without `=` are skipped, and any
//! field not mentioned keeps its default. Older releases stored the
//! configuration as a JSON object; that shape is still accepted on read.

use crate::models::Configuration;
use camino::Utf8PathBuf;
use serde::Deserialize;

/// First line of every serialized configuration
pub const CONFIG_HEADER: &str = "# Hymo Configuration";

/// Render `config` in the daemon's file format.
///
/// Field order is fixed. Empty path/string fields are left out so the daemon
/// falls back to its own defaults.
pub fn serialize(config: &Configuration) -> String {
    let mut out = String::new();
    out.push_str(CONFIG_HEADER);
    out.push('\n');

    let strings = [
        ("moduledir", config.moduledir.as_str()),
        ("tempdir", config.tempdir.as_str()),
        ("mountsource", config.mountsource.as_str()),
        ("logfile", config.logfile.as_str()),
    ];
    for (key, value) in strings {
        if !value.is_empty() {
            out.push_str(&format!("{} = \"{}\"\n", key, value));
        }
    }

    let flags = [
        ("verbose", config.verbose),
        ("force_ext4", config.force_ext4),
        ("disable_umount", config.disable_umount),
        ("enable_nuke", config.enable_nuke),
        ("ignore_protocol_mismatch", config.ignore_protocol_mismatch),
        ("enable_kernel_debug", config.enable_kernel_debug),
        ("enable_stealth", config.enable_stealth),
    ];
    for (key, value) in flags {
        out.push_str(&format!("{} = {}\n", key, value));
    }

    let partitions: Vec<&str> = config.partitions.iter().map(String::as_str).collect();
    out.push_str(&format!("partitions = \"{}\"\n", partitions.join(",")));

    out
}

/// Parse configuration text, starting from [`Configuration::default`].
pub fn parse(text: &str) -> Configuration {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Configuration::default();
    }
    if trimmed.starts_with('{') {
        return parse_legacy_json(trimmed);
    }

    let mut config = Configuration::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            tracing::debug!("Ignoring config line without '=': {}", line);
            continue;
        };

        apply(&mut config, key.trim(), unquote(value.trim()));
    }

    config
}

fn apply(config: &mut Configuration, key: &str, value: &str) {
    let flag = value == "true";
    match key {
        "moduledir" => config.moduledir = Utf8PathBuf::from(value),
        "tempdir" => config.tempdir = Utf8PathBuf::from(value),
        "mountsource" => config.mountsource = value.to_string(),
        "logfile" => config.logfile = Utf8PathBuf::from(value),
        "verbose" => config.verbose = flag,
        "force_ext4" => config.force_ext4 = flag,
        "disable_umount" => config.disable_umount = flag,
        "enable_nuke" => config.enable_nuke = flag,
        "ignore_protocol_mismatch" => config.ignore_protocol_mismatch = flag,
        "enable_kernel_debug" => config.enable_kernel_debug = flag,
        "enable_stealth" => config.enable_stealth = flag,
        "partitions" => {
            config.partitions.clear();
            for part in split_partitions(value) {
                config.partitions.insert(part);
            }
        }
        other => tracing::debug!("Ignoring unknown config key: {}", other),
    }
}

/// Strip one pair of matching single or double quotes. No escape handling.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn split_partitions(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrVec {
    String(String),
    Vec(Vec<String>),
}

/// JSON configuration written by older releases
#[derive(Deserialize, Default)]
#[serde(default)]
struct LegacyConfig {
    moduledir: Option<String>,
    tempdir: Option<String>,
    mountsource: Option<String>,
    logfile: Option<String>,
    verbose: Option<bool>,
    force_ext4: Option<bool>,
    disable_umount: Option<bool>,
    enable_nuke: Option<bool>,
    ignore_protocol_mismatch: Option<bool>,
    enable_kernel_debug: Option<bool>,
    enable_stealth: Option<bool>,
    partitions: Option<StringOrVec>,
}

fn parse_legacy_json(text: &str) -> Configuration {
    let legacy: LegacyConfig = match serde_json::from_str(text) {
        Ok(legacy) => legacy,
        Err(e) => {
            tracing::warn!("Unreadable JSON configuration, using defaults: {}", e);
            return Configuration::default();
        }
    };
    tracing::info!("Read configuration in legacy JSON format");

    let mut config = Configuration::default();
    if let Some(v) = legacy.moduledir {
        config.moduledir = Utf8PathBuf::from(v);
    }
    if let Some(v) = legacy.tempdir {
        config.tempdir = Utf8PathBuf::from(v);
    }
    if let Some(v) = legacy.mountsource {
        config.mountsource = v;
    }
    if let Some(v) = legacy.logfile {
        config.logfile = Utf8PathBuf::from(v);
    }

    let flags = [
        (legacy.verbose, &mut config.verbose),
        (legacy.force_ext4, &mut config.force_ext4),
        (legacy.disable_umount, &mut config.disable_umount),
        (legacy.enable_nuke, &mut config.enable_nuke),
        (legacy.ignore_protocol_mismatch, &mut config.ignore_protocol_mismatch),
        (legacy.enable_kernel_debug, &mut config.enable_kernel_debug),
        (legacy.enable_stealth, &mut config.enable_stealth),
    ];
    for (value, field) in flags {
        if let Some(v) = value {
            *field = v;
        }
    }

    match legacy.partitions {
        Some(StringOrVec::String(s)) => config.partitions.extend(split_partitions(&s)),
        Some(StringOrVec::Vec(v)) => config.partitions.extend(
            v.iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        ),
        None => {}
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexSet;
    use proptest::prelude::*;

    #[test]
    fn test_serialize_default() {
        let text = serialize(&Configuration::default());
        let expected = "# Hymo Configuration\n\
            moduledir = \"/data/adb/modules/\"\n\
            mountsource = \"KSU\"\n\
            logfile = \"/data/adb/hymo/daemon.log\"\n\
            verbose = false\n\
            force_ext4 = false\n\
            disable_umount = false\n\
            enable_nuke = false\n\
            ignore_protocol_mismatch = false\n\
            enable_kernel_debug = false\n\
            enable_stealth = false\n\
            partitions = \"\"\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_parse_empty_is_default() {
        assert_eq!(parse(""), Configuration::default());
        assert_eq!(parse("  \n\n"), Configuration::default());
    }

    #[test]
    fn test_parse_skips_comments_and_junk() {
        let text = "# header\n\n   # indented comment\nthis line has no separator\n\
            verbose = true\ncolour = \"blue\"\n  tempdir = '/dev/hymo_tmp'  \n";
        let config = parse(text);

        assert!(config.verbose);
        assert_eq!(config.tempdir, "/dev/hymo_tmp");
        assert_eq!(config.moduledir, "/data/adb/modules/");
    }

    #[test]
    fn test_booleans_require_literal_true() {
        let config = parse("verbose = TRUE\nforce_ext4 = 1\nenable_nuke = \"true\"\n");
        assert!(!config.verbose);
        assert!(!config.force_ext4);
        // Quotes are stripped before comparison
        assert!(config.enable_nuke);
    }

    #[test]
    fn test_partitions_split_trim_and_dedup() {
        let config = parse("partitions = \" my_product , ,odm_dlkm,my_product\"\n");
        let parts: Vec<_> = config.partitions.iter().cloned().collect();
        assert_eq!(parts, vec!["my_product", "odm_dlkm"]);
    }

    #[test]
    fn test_mismatched_quotes_are_kept() {
        let config = parse("mountsource = \"KSU'\n");
        assert_eq!(config.mountsource, "\"KSU'");
    }

    #[test]
    fn test_value_containing_equals() {
        let config = parse("tempdir = \"/tmp/a=b\"\n");
        assert_eq!(config.tempdir, "/tmp/a=b");
    }

    #[test]
    fn test_legacy_json_config() {
        let text = r#"{"moduledir":"/data/adb/modules_alt/","tempdir":null,"mountsource":"HybridMount","verbose":true,"partitions":["my_product"," ","odm"],"force_ext4":true}"#;
        let config = parse(text);

        assert_eq!(config.moduledir, "/data/adb/modules_alt/");
        assert!(config.tempdir.as_str().is_empty());
        assert_eq!(config.mountsource, "HybridMount");
        assert!(config.verbose);
        assert!(config.force_ext4);
        assert!(!config.enable_nuke);
        let parts: Vec<_> = config.partitions.iter().cloned().collect();
        assert_eq!(parts, vec!["my_product", "odm"]);
    }

    #[test]
    fn test_legacy_json_partitions_as_string() {
        let config = parse(r#"{"partitions":"a, b"}"#);
        assert_eq!(config.partitions.len(), 2);
    }

    #[test]
    fn test_broken_json_falls_back_to_default() {
        assert_eq!(parse("{ not json"), Configuration::default());
    }

    fn path_value() -> impl Strategy<Value = String> {
        "/[a-z0-9_./-]{1,24}"
    }

    fn config_strategy() -> impl Strategy<Value = Configuration> {
        (
            (
                path_value(),
                prop_oneof![Just(String::new()), path_value()],
                "[A-Za-z][A-Za-z0-9_]{0,11}",
                path_value(),
            ),
            proptest::collection::vec(any::<bool>(), 7),
            proptest::collection::vec("[a-z][a-z0-9_]{0,9}", 0..6),
        )
            .prop_map(|((moduledir, tempdir, mountsource, logfile), flags, parts)| {
                Configuration {
                    moduledir: moduledir.into(),
                    tempdir: tempdir.into(),
                    mountsource,
                    logfile: logfile.into(),
                    verbose: flags[0],
                    force_ext4: flags[1],
                    disable_umount: flags[2],
                    enable_nuke: flags[3],
                    ignore_protocol_mismatch: flags[4],
                    enable_kernel_debug: flags[5],
                    enable_stealth: flags[6],
                    partitions: parts.into_iter().collect::<IndexSet<_>>(),
                }
            })
    }

    proptest! {
        #[test]
        fn prop_round_trip(config in config_strategy()) {
            prop_assert_eq!(parse(&serialize(&config)), config);
        }

        #[test]
        fn prop_serialization_stabilizes(config in config_strategy()) {
            let once = serialize(&parse(&serialize(&config)));
            let twice = serialize(&parse(&once));
            prop_assert_eq!(once, twice);
        }
    }
}
