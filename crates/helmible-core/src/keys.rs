//! snake_case key harmonisation
//!
//! Ansible variable naming is snake_case while Helm values lean camelCase.
//! This module computes the canonical snake form of a key and collects, from
//! a values tree, every key whose canonical form differs from the original.
//! The textual substitution itself is applied by the export rewriters.

use indexmap::IndexMap;
use serde_yaml::Value;

/// Converts a camelCase, PascalCase or kebab-case identifier to snake_case.
///
/// Acronym runs collapse into a single word (`enableHTTPProbe` becomes
/// `enable_http_probe`); identifiers that are already snake_case come back
/// unchanged.
pub fn to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' {
            out.push('_');
            continue;
        }
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Walks a values tree and returns the keys whose snake_case form differs,
/// mapped to that form. Keys are recorded in document order, nested mappings
/// included; sequence elements that are mappings are walked as well, since
/// their keys surface in templates through `range` bodies.
pub fn snake_case_renames(values: &Value) -> IndexMap<String, String> {
    let mut renames = IndexMap::new();
    collect(values, &mut renames);
    renames
}

fn collect(value: &Value, renames: &mut IndexMap<String, String>) {
    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                if let Some(name) = key.as_str() {
                    let snake = to_snake(name);
                    if snake != name {
                        renames.insert(name.to_string(), snake);
                    }
                }
                collect(child, renames);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                collect(item, renames);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case() {
        assert_eq!(to_snake("replicaCount"), "replica_count");
        assert_eq!(to_snake("imagePullPolicy"), "image_pull_policy");
    }

    #[test]
    fn pascal_case() {
        assert_eq!(to_snake("ReplicaCount"), "replica_count");
    }

    #[test]
    fn kebab_case() {
        assert_eq!(to_snake("pull-policy"), "pull_policy");
    }

    #[test]
    fn acronym_runs() {
        assert_eq!(to_snake("enableHTTPProbe"), "enable_http_probe");
        assert_eq!(to_snake("HTTPPort"), "http_port");
    }

    #[test]
    fn already_snake() {
        assert_eq!(to_snake("replica_count"), "replica_count");
        assert_eq!(to_snake("simple"), "simple");
    }

    #[test]
    fn renames_only_differing_keys() {
        let values: Value = serde_yaml::from_str(
            r#"
replicaCount: 1
simple: x
image:
  pullPolicy: IfNotPresent
  tag: latest
extraEnvs:
  - envName: FOO
    value: bar
"#,
        )
        .unwrap();
        let renames = snake_case_renames(&values);
        assert_eq!(renames.get("replicaCount").map(String::as_str), Some("replica_count"));
        assert_eq!(renames.get("pullPolicy").map(String::as_str), Some("pull_policy"));
        assert_eq!(renames.get("envName").map(String::as_str), Some("env_name"));
        assert!(!renames.contains_key("simple"));
        assert!(!renames.contains_key("tag"));
        assert!(!renames.contains_key("value"));
    }
}
