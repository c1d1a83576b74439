//! Typed lookups into the merged YAML config tree.

use serde_json::Value;

pub fn lookup<'a>(config: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(config, |current, key| current.get(*key))
}

pub fn config_u64(config: &Value, path: &[&str]) -> Option<u64> {
    lookup(config, path).and_then(|v| v.as_u64())
}

pub fn config_f64(config: &Value, path: &[&str]) -> Option<f64> {
    lookup(config, path).and_then(|v| v.as_f64())
}

/// Non-empty, trimmed string at `path`.
pub fn config_str(config: &Value, path: &[&str]) -> Option<String> {
    lookup(config, path)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Trimmed, non-empty strings of the array at `path`.
pub fn config_string_list(config: &Value, path: &[&str]) -> Vec<String> {
    lookup(config, path)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
