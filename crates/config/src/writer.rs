//! Section-aware merge writer for the persisted settings files.
//!
//! Responsibilities:
//! - Apply a flat set of key/value updates to one section of a sectioned
//!   text file, preserving every unrelated line verbatim.
//! - Create the file (and parent directories) on first write, with an
//!   optional comment block written exactly once.
//! - Replace the file atomically so a failed write never corrupts it.
//!
//! Does NOT handle:
//! - Deciding which file a key belongs in (callers route secret keys to
//!   the credentials file; see the configure/login commands).
//!
//! Invariants:
//! - Keys absent from the update set are never touched.
//! - Sections other than the target are never touched.
//! - An update that changes nothing leaves the file byte-for-byte intact.
//! - Newly created files are readable only by the owner on Unix.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::constants::{DEFAULT_PROFILE_NAME, SECTION_OVERRIDE_KEY};
use crate::error::ConfigError;

/// Flat key/value updates for one write, plus the optional
/// `__section__` override entry.
pub type UpdateValues = BTreeMap<String, String>;

/// Writer seam so command flows can be tested against a recording double.
pub trait ConfigWriter {
    /// Merge-writes `new_values` into `path`.
    ///
    /// The target section is the `__section__` entry if present (removed
    /// before merging), otherwise the default section. `comment` is
    /// written once if the file is being created.
    fn update_config(
        &self,
        new_values: &UpdateValues,
        path: &Path,
        comment: Option<&str>,
    ) -> Result<(), ConfigError>;
}

/// The real merge writer.
#[derive(Debug, Default)]
pub struct ConfigFileWriter;

impl ConfigFileWriter {
    pub fn new() -> Self {
        Self
    }

    /// Renames a section header in place, leaving its keys untouched.
    ///
    /// A missing source section is a no-op.
    pub fn rename_section(
        &self,
        path: &Path,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), ConfigError> {
        if !path.exists() {
            return Ok(());
        }
        let original = std::fs::read_to_string(path)?;
        let mut changed = false;
        let mut lines: Vec<String> = Vec::new();
        for line in original.lines() {
            if !changed && is_section_header(line, old_name) {
                lines.push(format!("[{new_name}]"));
                changed = true;
            } else {
                lines.push(line.to_string());
            }
        }
        if changed {
            write_atomically(path, &render(&lines))?;
        }
        Ok(())
    }
}

impl ConfigWriter for ConfigFileWriter {
    fn update_config(
        &self,
        new_values: &UpdateValues,
        path: &Path,
        comment: Option<&str>,
    ) -> Result<(), ConfigError> {
        let mut pending = new_values.clone();
        let section = pending
            .remove(SECTION_OVERRIDE_KEY)
            .unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string());
        if pending.is_empty() {
            return Ok(());
        }

        if !path.exists() {
            let content = render_new_file(&section, &pending, comment);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            write_atomically(path, &content)?;
            restrict_permissions(path)?;
            tracing::debug!(path = %path.display(), section = %section, "Created settings file");
            return Ok(());
        }

        let original = std::fs::read_to_string(path)?;
        let updated = merge_into(&original, &section, &mut pending);
        if updated == original {
            return Ok(());
        }
        write_atomically(path, &updated)?;
        tracing::debug!(path = %path.display(), section = %section, "Updated settings file");
        Ok(())
    }
}

fn is_section_header(line: &str, name: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('[')
        && trimmed.ends_with(']')
        && trimmed[1..trimmed.len() - 1].trim() == name
}

fn is_any_section_header(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('[') && trimmed.ends_with(']')
}

fn key_of(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
        return None;
    }
    trimmed.split_once('=').map(|(key, _)| key.trim())
}

fn render(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn render_new_file(section: &str, values: &BTreeMap<String, String>, comment: Option<&str>) -> String {
    let mut lines: Vec<String> = Vec::new();
    if let Some(comment) = comment {
        for comment_line in comment.lines() {
            lines.push(format!("# {comment_line}"));
        }
    }
    lines.push(format!("[{section}]"));
    for (key, value) in values {
        lines.push(format!("{key} = {value}"));
    }
    render(&lines)
}

/// Applies the pending updates to the target section of `original`,
/// returning the new file content. Consumes keys from `pending` as they
/// are placed.
fn merge_into(original: &str, section: &str, pending: &mut BTreeMap<String, String>) -> String {
    let mut lines: Vec<String> = original.lines().map(str::to_string).collect();

    let Some(header_idx) = lines.iter().position(|l| is_section_header(l, section)) else {
        // Section absent entirely: append it at EOF.
        if lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(format!("[{section}]"));
        for (key, value) in pending.iter() {
            lines.push(format!("{key} = {value}"));
        }
        return render(&lines);
    };

    let section_end = lines[header_idx + 1..]
        .iter()
        .position(|l| is_any_section_header(l))
        .map(|offset| header_idx + 1 + offset)
        .unwrap_or(lines.len());

    // Update keys in place.
    for line in &mut lines[header_idx + 1..section_end] {
        let Some(key) = key_of(line).map(str::to_string) else {
            continue;
        };
        if let Some(value) = pending.remove(&key) {
            *line = format!("{key} = {value}");
        }
    }

    // Insert remaining new keys after the section's last content line so
    // a trailing blank separator stays at the section boundary.
    let mut insert_at = section_end;
    while insert_at > header_idx + 1 && lines[insert_at - 1].trim().is_empty() {
        insert_at -= 1;
    }
    for (key, value) in pending.iter() {
        lines.insert(insert_at, format!("{key} = {value}"));
        insert_at += 1;
    }

    render(&lines)
}

/// Writes `content` through a temp file in the same directory, then
/// atomically renames over `path`.
fn write_atomically(path: &Path, content: &str) -> Result<(), ConfigError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.persist(path).map_err(|e| ConfigError::Io(e.error))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
