//! Sectioned settings-file reading.
//!
//! Responsibilities:
//! - Parse the INI-like sectioned text of the config and credentials files.
//! - Build the nested profile tree consumed by the resolver: a top-level
//!   `profiles` object plus predefined sections (e.g. `preview`).
//!
//! Does NOT handle:
//! - Writing or merging values back to disk (see `writer.rs`).
//! - Precedence across sources (see `context.rs`).
//!
//! Invariants:
//! - The loaded tree is a read-only snapshot; nothing in this crate
//!   mutates it after loading.
//! - Dotted keys nest: `s3.signature_version = v` loads as
//!   `{"s3": {"signature_version": "v"}}`.
//! - A missing file loads as an empty tree, not an error.

use std::path::Path;

use serde_json::{Map, Value};

use crate::constants::DEFAULT_PROFILE_NAME;
use crate::error::ConfigError;

/// Parses a sectioned file into `section name -> settings object`.
///
/// Lines are `key = value` pairs grouped under `[section]` headers. Blank
/// lines and `#`/`;` comment lines are skipped. Dotted keys nest.
pub(crate) fn raw_config_parse(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "Settings file not found, loading empty config");
        return Ok(Map::new());
    }
    let text = std::fs::read_to_string(path)?;
    parse_sections(&text, path)
}

fn parse_sections(text: &str, path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let mut sections: Map<String, Value> = Map::new();
    let mut current: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    message: "unterminated section header".to_string(),
                });
            }
            let name = line[1..line.len() - 1].trim().to_string();
            sections
                .entry(name.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = Some(name);
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                message: "expected 'key = value'".to_string(),
            });
        };
        let Some(section_name) = current.as_ref() else {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                message: "key/value pair outside of any section".to_string(),
            });
        };
        let section = sections
            .get_mut(section_name)
            .and_then(Value::as_object_mut)
            .expect("section inserted as object above");
        insert_nested(section, key.trim(), value.trim());
    }

    Ok(sections)
}

/// Inserts a possibly-dotted key, nesting intermediate objects.
fn insert_nested(target: &mut Map<String, Value>, key: &str, value: &str) {
    let mut parts = key.split('.').peekable();
    let mut node = target;
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            node.insert(part.to_string(), Value::String(value.to_string()));
            return;
        }
        let entry = node
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        node = entry.as_object_mut().expect("just ensured object");
    }
}

/// Loads the full configuration tree from the config file, then merges in
/// profile names found in the credentials file.
///
/// Config-file sections map as: `[default]` -> `profiles.default`,
/// `[profile NAME]` -> `profiles.NAME`, anything else stays top-level
/// (e.g. `[preview]`). Credentials-file sections are bare profile names;
/// their values are merged under the matching profile so profile selection
/// sees profiles that exist only in the credentials file.
pub(crate) fn load_full_config(
    config_path: &Path,
    credentials_path: &Path,
) -> Result<Map<String, Value>, ConfigError> {
    let raw = raw_config_parse(config_path)?;
    let mut profiles: Map<String, Value> = Map::new();
    let mut full: Map<String, Value> = Map::new();

    for (section, values) in raw {
        if section == DEFAULT_PROFILE_NAME {
            profiles.insert(section, values);
        } else if let Some(name) = section.strip_prefix("profile ") {
            profiles.insert(name.trim().to_string(), values);
        } else {
            full.insert(section, values);
        }
    }

    for (profile, values) in raw_config_parse(credentials_path)? {
        match profiles.get_mut(&profile).and_then(Value::as_object_mut) {
            Some(existing) => {
                if let Value::Object(values) = values {
                    existing.extend(values);
                }
            }
            None => {
                profiles.insert(profile, values);
            }
        }
    }

    full.insert("profiles".to_string(), Value::Object(profiles));
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_sections_and_pairs() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "config",
            "[default]\nregion = us-west-1\n\n[profile dev]\nendpoint_url = https://dev.nimbus.cloud\n",
        );
        let parsed = raw_config_parse(&path).unwrap();
        assert_eq!(parsed["default"]["region"], "us-west-1");
        assert_eq!(
            parsed["profile dev"]["endpoint_url"],
            "https://dev.nimbus.cloud"
        );
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "config",
            "# header comment\n\n[default]\n; inline section comment\nregion = eu-1\n",
        );
        let parsed = raw_config_parse(&path).unwrap();
        assert_eq!(parsed["default"]["region"], "eu-1");
    }

    #[test]
    fn test_parse_nests_dotted_keys() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "config",
            "[profile testing]\ns3.signature_version = s3v4\n",
        );
        let parsed = raw_config_parse(&path).unwrap();
        assert_eq!(parsed["profile testing"]["s3"]["signature_version"], "s3v4");
    }

    #[test]
    fn test_parse_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let parsed = raw_config_parse(&dir.path().join("nope")).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_parse_rejects_stray_pairs() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "config", "region = us-west-1\n");
        let err = raw_config_parse(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_full_config_maps_profile_sections() {
        let dir = TempDir::new().unwrap();
        let config = write_file(
            &dir,
            "config",
            "[default]\nregion = us-west-1\n[profile dev]\nregion = eu-1\n[preview]\ndeploy = true\n",
        );
        let creds = write_file(&dir, "credentials", "[dev]\naccess_key_id = AK\n");
        let full = load_full_config(&config, &creds).unwrap();
        assert_eq!(full["profiles"]["default"]["region"], "us-west-1");
        assert_eq!(full["profiles"]["dev"]["region"], "eu-1");
        assert_eq!(full["profiles"]["dev"]["access_key_id"], "AK");
        assert_eq!(full["preview"]["deploy"], "true");
    }

    #[test]
    fn test_full_config_credentials_only_profile() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config");
        let creds = write_file(&dir, "credentials", "[ci]\naccess_key_id = AK\n");
        let full = load_full_config(&config, &creds).unwrap();
        assert_eq!(full["profiles"]["ci"]["access_key_id"], "AK");
    }
}
