//! Dotted-path lookups over the full configuration tree.
//!
//! Backs free-form `configure get` queries. The first path segment is
//! interpreted, in order of preference, as a reserved top-level section,
//! the literal token `profile` followed by a profile name, or an existing
//! profile name; otherwise the whole path is looked up nested inside the
//! active profile, then inside the default profile. A miss at any level
//! is `None`, never an error.

use serde_json::{Map, Value};

use crate::constants::{DEFAULT_PROFILE_NAME, PREDEFINED_SECTION_NAMES};

/// Resolves a dotted name against the full config tree for the given
/// active profile. Only string leaves resolve; landing on a nested
/// object is a miss.
pub fn resolve_path(
    full_config: &Map<String, Value>,
    active_profile: &str,
    name: &str,
) -> Option<String> {
    let segments: Vec<&str> = name.split('.').collect();
    let first = *segments.first()?;
    let profiles = full_config.get("profiles").and_then(Value::as_object);

    if PREDEFINED_SECTION_NAMES.contains(&first) {
        return navigate(full_config.get(first), &segments[1..]);
    }
    if first == "profile" && segments.len() >= 2 {
        let profile = profiles.and_then(|p| p.get(segments[1]));
        return navigate(profile, &segments[2..]);
    }
    if let Some(profile) = profiles.and_then(|p| p.get(first)) {
        return navigate(Some(profile), &segments[1..]);
    }
    // First segment names no profile: the whole path nests inside the
    // active profile, then the default profile.
    let active = profiles.and_then(|p| p.get(active_profile));
    navigate(active, &segments).or_else(|| {
        let default = profiles.and_then(|p| p.get(DEFAULT_PROFILE_NAME));
        navigate(default, &segments)
    })
}

fn navigate(start: Option<&Value>, segments: &[&str]) -> Option<String> {
    let mut node = start?;
    for segment in segments {
        node = node.as_object()?.get(*segment)?;
    }
    node.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Map<String, Value> {
        serde_json::from_value(serde_json::json!({
            "preview": { "deploy": "true" },
            "profiles": {
                "default": {
                    "region": "us-west-1",
                    "s3": { "signature_version": "s3v4" }
                },
                "testing": {
                    "access_key_id": "TESTAK",
                    "nested": { "inner": "leaf" }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_reserved_section_ignores_active_profile() {
        let full = tree();
        assert_eq!(
            resolve_path(&full, "testing", "preview.deploy"),
            Some("true".to_string())
        );
    }

    #[test]
    fn test_profile_prefix_targets_named_profile() {
        let full = tree();
        assert_eq!(
            resolve_path(&full, "default", "profile.testing.access_key_id"),
            Some("TESTAK".to_string())
        );
    }

    #[test]
    fn test_bare_profile_name_targets_that_profile() {
        let full = tree();
        assert_eq!(
            resolve_path(&full, "testing", "default.region"),
            Some("us-west-1".to_string())
        );
        assert_eq!(
            resolve_path(&full, "default", "testing.nested.inner"),
            Some("leaf".to_string())
        );
    }

    #[test]
    fn test_unqualified_path_nests_inside_active_profile() {
        let full = tree();
        assert_eq!(
            resolve_path(&full, "default", "s3.signature_version"),
            Some("s3v4".to_string())
        );
        assert_eq!(
            resolve_path(&full, "default", "region"),
            Some("us-west-1".to_string())
        );
    }

    #[test]
    fn test_unqualified_path_falls_back_to_default_profile() {
        let full = tree();
        assert_eq!(
            resolve_path(&full, "testing", "region"),
            Some("us-west-1".to_string())
        );
    }

    #[test]
    fn test_misses_are_none_not_errors() {
        let full = tree();
        assert_eq!(resolve_path(&full, "default", "absent"), None);
        assert_eq!(resolve_path(&full, "default", "s3.missing.deeper"), None);
        assert_eq!(resolve_path(&full, "default", "profile.ghost.region"), None);
        // Landing on an object is a miss.
        assert_eq!(resolve_path(&full, "default", "s3"), None);
    }
}
