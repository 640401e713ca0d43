//! Merges the daemon's module inventory with locally stored overrides, and
//! turns the merged list back into override files for saving.
//!
//! Two override files live next to the daemon config:
//!
//! ```text
//! # Module Modes
//! zygisk_lsposed=magic
//!
//! # Module Rules
//! zygisk_lsposed:system/framework=magic
//! ```
//!
//! Overrides win over whatever the daemon reports. Output order is always the
//! daemon's scan order.

use crate::models::module::DEFAULT_STRATEGY;
use crate::models::{ModuleMode, ModuleRecord, Rule};
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use thiserror::Error;

pub const MODES_HEADER: &str = "# Module Modes";
pub const RULES_HEADER: &str = "# Module Rules";

static MODULE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("Invalid module id regex"));

/// Module-level mode overrides keyed by module id
pub type ModeOverrides = IndexMap<String, ModuleMode>;

/// Rule overrides keyed by module id, rules in file order
pub type RuleOverrides = IndexMap<String, Vec<Rule>>;

/// Only ids matching `[A-Za-z0-9_.-]+` are ever written to override files
pub fn is_valid_module_id(id: &str) -> bool {
    MODULE_ID_PATTERN.is_match(id)
}

/// One module as reported by the daemon, before merging
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawModule {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub mode: Option<String>,
    pub strategy: Option<String>,
    pub path: Option<String>,
    pub rules: Vec<Rule>,
}

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Invalid module inventory JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Module inventory is neither an array nor an object with a modules array")]
    UnexpectedShape,
}

/// Parse the daemon's inventory: a bare array, or `{"modules": [...]}`.
///
/// Elements that are not module objects are dropped with a warning; one bad
/// entry never rejects the whole inventory.
pub fn parse_inventory(json: &str) -> Result<Vec<RawModule>, InventoryError> {
    let document: serde_json::Value = serde_json::from_str(json)?;

    let entries = match document {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(mut map) => match map.remove("modules") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => return Err(InventoryError::UnexpectedShape),
        },
        _ => return Err(InventoryError::UnexpectedShape),
    };

    let modules = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<RawModule>(entry) {
            Ok(module) => Some(module),
            Err(e) => {
                tracing::warn!("Dropping malformed module entry #{}: {}", index, e);
                None
            }
        })
        .collect();

    Ok(modules)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Merge a scan with stored overrides.
///
/// A stored mode replaces the daemon-reported one; stored rules replace the
/// daemon-reported rule list. Entries without an id are dropped.
pub fn reconcile(
    raw_modules: Vec<RawModule>,
    mode_overrides: &ModeOverrides,
    rule_overrides: &RuleOverrides,
) -> Vec<ModuleRecord> {
    let mut records = Vec::with_capacity(raw_modules.len());

    for raw in raw_modules {
        let Some(id) = non_empty(raw.id) else {
            tracing::warn!(
                "Dropping module without id (name: {})",
                raw.name.as_deref().unwrap_or("<none>")
            );
            continue;
        };

        let reported_mode = raw
            .mode
            .as_deref()
            .map(|m| {
                m.parse::<ModuleMode>().unwrap_or_else(|e| {
                    tracing::debug!("Module {}: {}, treating as auto", id, e);
                    ModuleMode::Auto
                })
            })
            .unwrap_or_default();

        let mode = mode_overrides.get(&id).copied().unwrap_or(reported_mode);
        let rules = rule_overrides.get(&id).cloned().unwrap_or(raw.rules);

        records.push(ModuleRecord {
            name: non_empty(raw.name).unwrap_or_else(|| id.clone()),
            version: raw.version.unwrap_or_default(),
            author: raw.author.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            mode,
            strategy: non_empty(raw.strategy).unwrap_or_else(|| DEFAULT_STRATEGY.to_string()),
            path: raw.path.unwrap_or_default(),
            rules,
            id,
        });
    }

    tracing::debug!("Reconciled {} modules", records.len());
    records
}

/// Modes worth persisting: anything other than `auto`, valid ids only.
pub fn extract_modes(modules: &[ModuleRecord]) -> ModeOverrides {
    modules
        .iter()
        .filter(|m| m.mode != ModuleMode::Auto)
        .filter(|m| {
            let valid = is_valid_module_id(&m.id);
            if !valid {
                tracing::debug!("Not persisting mode for invalid module id {:?}", m.id);
            }
            valid
        })
        .map(|m| (m.id.clone(), m.mode))
        .collect()
}

/// One `(id, rule)` pair per persistable rule, in module then rule order.
///
/// Ids that fail validation are skipped for the same reason as in
/// [`extract_modes`]: they end up inside a shell-quoted payload.
pub fn extract_rules(modules: &[ModuleRecord]) -> Vec<(String, Rule)> {
    modules
        .iter()
        .filter(|m| is_valid_module_id(&m.id))
        .flat_map(|m| {
            m.rules
                .iter()
                .filter(|r| r.is_persistable())
                .map(move |r| (m.id.clone(), r.clone()))
        })
        .collect()
}

pub fn render_mode_overrides(modes: &ModeOverrides) -> String {
    let mut out = format!("{}\n", MODES_HEADER);
    for (id, mode) in modes {
        out.push_str(&format!("{}={}\n", id, mode));
    }
    out
}

pub fn render_rule_overrides(rules: &[(String, Rule)]) -> String {
    let mut out = format!("{}\n", RULES_HEADER);
    for (id, rule) in rules {
        out.push_str(&format!("{}:{}={}\n", id, rule.path.trim(), rule.mode.trim()));
    }
    out
}

fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Parse `id=mode` lines. Modes are case-insensitive; unknown ones are skipped.
pub fn parse_mode_overrides(text: &str) -> ModeOverrides {
    let mut modes = ModeOverrides::new();

    for line in content_lines(text) {
        let Some((id, mode)) = line.split_once('=') else {
            continue;
        };
        let id = id.trim();
        if id.is_empty() {
            continue;
        }
        match mode.parse::<ModuleMode>() {
            Ok(mode) => {
                modes.insert(id.to_string(), mode);
            }
            Err(e) => tracing::warn!("Ignoring mode override for {}: {}", id, e),
        }
    }

    modes
}

/// Parse `id:path=mode` lines, grouping rules per module in file order.
pub fn parse_rule_overrides(text: &str) -> RuleOverrides {
    let mut rules = RuleOverrides::new();

    for line in content_lines(text) {
        let parsed = line.split_once(':').and_then(|(id, rest)| {
            rest.rsplit_once('=')
                .map(|(path, mode)| (id.trim(), Rule::new(path.trim(), mode.trim().to_ascii_lowercase())))
        });

        match parsed {
            Some((id, rule)) if !id.is_empty() && rule.is_persistable() => {
                rules.entry(id.to_string()).or_default().push(rule);
            }
            _ => tracing::debug!("Ignoring malformed rule line: {}", line),
        }
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str) -> RawModule {
        RawModule {
            id: Some(id.to_string()),
            ..RawModule::default()
        }
    }

    #[test]
    fn test_override_takes_precedence() {
        let mut modes = ModeOverrides::new();
        modes.insert("x".to_string(), ModuleMode::Magic);

        let mut with_auto = raw("x");
        with_auto.mode = Some("auto".to_string());

        let merged = reconcile(vec![with_auto.clone()], &modes, &RuleOverrides::new());
        assert_eq!(merged[0].mode, ModuleMode::Magic);

        let merged = reconcile(vec![with_auto], &ModeOverrides::new(), &RuleOverrides::new());
        assert_eq!(merged[0].mode, ModuleMode::Auto);
    }

    #[test]
    fn test_reconcile_defaults_and_order() {
        let mut b = raw("b");
        b.name = Some("Bravo".to_string());
        b.strategy = Some("hymofs".to_string());

        let merged = reconcile(
            vec![raw("c"), b, raw("a")],
            &ModeOverrides::new(),
            &RuleOverrides::new(),
        );

        let ids: Vec<_> = merged.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(merged[0].name, "c");
        assert_eq!(merged[0].strategy, "overlay");
        assert_eq!(merged[1].name, "Bravo");
        assert_eq!(merged[1].strategy, "hymofs");
    }

    #[test]
    fn test_reconcile_drops_missing_ids() {
        let nameless = RawModule {
            name: Some("ghost".to_string()),
            ..RawModule::default()
        };
        let blank = raw("  ");

        let merged = reconcile(
            vec![nameless, raw("ok"), blank],
            &ModeOverrides::new(),
            &RuleOverrides::new(),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "ok");
    }

    #[test]
    fn test_rule_overrides_replace_reported_rules() {
        let mut reported = raw("m");
        reported.rules = vec![Rule::new("system/app", "skip")];

        let merged = reconcile(vec![reported.clone()], &ModeOverrides::new(), &RuleOverrides::new());
        assert_eq!(merged[0].rules, vec![Rule::new("system/app", "skip")]);

        let mut overrides = RuleOverrides::new();
        overrides.insert("m".to_string(), vec![Rule::new("vendor/lib", "magic")]);
        let merged = reconcile(vec![reported], &ModeOverrides::new(), &overrides);
        assert_eq!(merged[0].rules, vec![Rule::new("vendor/lib", "magic")]);
    }

    #[test]
    fn test_unknown_reported_mode_is_auto() {
        let mut m = raw("m");
        m.mode = Some("hymofs".to_string());
        let merged = reconcile(vec![m], &ModeOverrides::new(), &RuleOverrides::new());
        assert_eq!(merged[0].mode, ModuleMode::Auto);
    }

    #[test]
    fn test_parse_inventory_shapes() {
        let bare = r#"[{"id":"a"},{"id":"b","mode":"magic"}]"#;
        assert_eq!(parse_inventory(bare).unwrap().len(), 2);

        let envelope = r#"{"count":1,"modules":[{"id":"a","rules":[{"path":"system/bin","mode":"magic"}]}]}"#;
        let modules = parse_inventory(envelope).unwrap();
        assert_eq!(modules[0].rules, vec![Rule::new("system/bin", "magic")]);

        assert!(matches!(
            parse_inventory(r#"{"error":"scan failed"}"#),
            Err(InventoryError::UnexpectedShape)
        ));
        assert!(matches!(parse_inventory("not json"), Err(InventoryError::Json(_))));
    }

    #[test]
    fn test_parse_inventory_drops_bad_entries() {
        let json = r#"[{"id":"a"}, 42, {"id":"b","version":7}, {"id":"c"}]"#;
        let ids: Vec<_> = parse_inventory(json)
            .unwrap()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_extract_modes_filters() {
        let mut magic = ModuleRecord::new("good.mod-1");
        magic.mode = ModuleMode::Magic;
        let mut bad_id = ModuleRecord::new("bad id;rm");
        bad_id.mode = ModuleMode::Overlay;
        let auto = ModuleRecord::new("auto_mod");

        let modes = extract_modes(&[magic, bad_id, auto]);
        assert_eq!(modes.len(), 1);
        assert_eq!(modes.get("good.mod-1"), Some(&ModuleMode::Magic));
    }

    #[test]
    fn test_extract_rules_one_line_per_rule() {
        let mut a = ModuleRecord::new("a");
        a.rules = vec![
            Rule::new("system/bin", "magic"),
            Rule::new("", "skip"),
            Rule::new("system/etc", "overlay"),
        ];
        let b = ModuleRecord::new("b");

        let rules = extract_rules(&[a, b]);
        assert_eq!(rules.len(), 2);
        assert_eq!(
            render_rule_overrides(&rules),
            "# Module Rules\na:system/bin=magic\na:system/etc=overlay\n"
        );
    }

    #[test]
    fn test_rule_with_line_break_not_rendered() {
        let mut a = ModuleRecord::new("a");
        a.rules = vec![
            Rule::new("system/bin=magic\nb:system/app", "skip"),
            Rule::new("system/etc", "overlay"),
        ];

        let text = render_rule_overrides(&extract_rules(&[a]));
        assert_eq!(text, "# Module Rules\na:system/etc=overlay\n");
        assert!(!parse_rule_overrides(&text).contains_key("b"));
    }

    #[test]
    fn test_mode_file_round_trip() {
        let mut modes = ModeOverrides::new();
        modes.insert("a".to_string(), ModuleMode::Magic);
        modes.insert("b".to_string(), ModuleMode::Overlay);

        let text = render_mode_overrides(&modes);
        assert_eq!(text, "# Module Modes\na=magic\nb=overlay\n");
        assert_eq!(parse_mode_overrides(&text), modes);
    }

    #[test]
    fn test_parse_mode_overrides_tolerant() {
        let modes = parse_mode_overrides("  # c\n\nx = MAGIC\ny=sideways\nnoequals\n=overlay\n");
        assert_eq!(modes.len(), 1);
        assert_eq!(modes.get("x"), Some(&ModuleMode::Magic));
    }

    #[test]
    fn test_parse_rule_overrides_groups_by_module() {
        let text = "# Module Rules\na:system/bin=magic\nb:vendor=Skip\na:system/etc=overlay\nbroken line\nc:=magic\n";
        let rules = parse_rule_overrides(text);

        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules["a"],
            vec![Rule::new("system/bin", "magic"), Rule::new("system/etc", "overlay")]
        );
        assert_eq!(rules["b"], vec![Rule::new("vendor", "skip")]);
    }

    #[test]
    fn test_module_id_pattern() {
        assert!(is_valid_module_id("zygisk_lsposed"));
        assert!(is_valid_module_id("a.b-c_9"));
        assert!(!is_valid_module_id(""));
        assert!(!is_valid_module_id("has space"));
        assert!(!is_valid_module_id("quote'd"));
    }
}
