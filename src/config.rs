//! Policy configuration loading (C9).
//!
//! Mirrors `lint.rs`'s `LintConfig`/`lints.toml` pattern: an embedded
//! default document loaded via `include_str!`, with an optional
//! user-supplied TOML file merged over it key-by-key so a partial policy
//! file only needs to name the fields it overrides. The merged result is
//! deserialized straight into `GenPolicy`, whose `deny_unknown_fields`
//! rejects any key that isn't one of its own.

use std::fs;
use std::path::Path;

use toml::Value;

use crate::error::GenError;
use crate::policy::GenPolicy;

/// Embedded default generation policy.
pub static DEFAULT_POLICY: &str = include_str!("policy.toml");

/// Loads the generation policy: the embedded default, optionally
/// overridden field-by-field by the TOML file at `path`.
pub fn load_policy(path: Option<&Path>) -> Result<GenPolicy, GenError> {
    let mut merged: Value =
        toml::from_str(DEFAULT_POLICY).map_err(|e| GenError::Config(e.to_string()))?;
    if let Some(path) = path {
        let text = fs::read_to_string(path)?;
        let overlay: Value = toml::from_str(&text).map_err(|e| GenError::Config(e.to_string()))?;
        merge_toml(&mut merged, overlay);
    }
    merged.try_into().map_err(|e: toml::de::Error| GenError::Config(e.to_string()))
}

/// Writes the embedded default policy document verbatim, for a
/// `policy-template` CLI subcommand to seed a user's own override file.
pub fn default_policy_text() -> &'static str {
    DEFAULT_POLICY
}

fn merge_toml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_tbl), Value::Table(overlay_tbl)) => {
            for (key, value) in overlay_tbl {
                match base_tbl.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base_tbl.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_loads_and_matches_gen_policy_default() {
        let loaded = load_policy(None).expect("embedded policy must parse");
        let default = GenPolicy::default();
        assert_eq!(loaded.scope_stmt_min, default.scope_stmt_min);
        assert_eq!(loaded.binary_op_distr.len(), default.binary_op_distr.len());
        assert_eq!(loaded.int_type_distr.len(), default.int_type_distr.len());
    }

    #[test]
    fn partial_override_falls_back_to_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("policy.toml");
        fs::write(&path, "scope_stmt_min = 1\nscope_stmt_max = 1\n").expect("write override");
        let loaded = load_policy(Some(&path)).expect("override must parse");
        assert_eq!(loaded.scope_stmt_min, 1);
        assert_eq!(loaded.scope_stmt_max, 1);
        assert_eq!(loaded.if_depth_limit, GenPolicy::default().if_depth_limit);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("policy.toml");
        fs::write(&path, "not_a_real_field = 5\n").expect("write override");
        let result = load_policy(Some(&path));
        assert!(result.is_err());
    }
}
