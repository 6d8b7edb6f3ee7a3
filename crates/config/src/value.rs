//! Resolved configuration values and secret masking.
//!
//! Responsibilities:
//! - Represent one resolved setting together with where it came from.
//! - Mask secrets for display, exposing at most the last four characters.
//!
//! Invariants:
//! - `source_kind == SourceKind::None` iff `value == NOT_SET`.
//! - A masked value never reveals any run of four or more consecutive
//!   characters of the secret other than its last four.

use crate::constants::NOT_SET;

/// Where a resolved configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// No source; the value is the `NOT_SET` sentinel.
    None,
    /// Supplied explicitly on the command line.
    Manual,
    /// Read from an environment variable.
    Environment,
    /// Read from the config file's scoped view.
    ConfigFile,
}

impl SourceKind {
    /// Display label matching the `configure list` output.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::None => "None",
            SourceKind::Manual => "manual",
            SourceKind::Environment => "env",
            SourceKind::ConfigFile => "config-file",
        }
    }
}

/// One resolved setting: the value, the kind of source that produced it,
/// and the concrete location (env var name, file path, or flag name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
    pub value: String,
    pub source_kind: SourceKind,
    pub source_location: String,
}

impl ConfigValue {
    pub fn new(
        value: impl Into<String>,
        source_kind: SourceKind,
        source_location: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            source_kind,
            source_location: source_location.into(),
        }
    }

    /// A value that resolved nowhere.
    pub fn not_set() -> Self {
        Self {
            value: NOT_SET.to_string(),
            source_kind: SourceKind::None,
            source_location: String::new(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.source_kind != SourceKind::None
    }

    /// Replaces the value with its masked rendering, in place.
    ///
    /// The `NOT_SET` sentinel is left untouched. Masking consumes the
    /// original value; calling this twice on the same instance would mask
    /// the already-masked rendering and is not a defined operation.
    pub fn mask_value(&mut self) {
        if self.value == NOT_SET {
            return;
        }
        self.value = mask_value(Some(&self.value));
    }
}

/// Masks a secret for display.
///
/// `None` renders as the literal string `"None"`; the `NOT_SET` sentinel
/// passes through unchanged. Anything else renders as sixteen `*`
/// characters followed by the last four characters of the secret. Secrets
/// shorter than four characters keep whatever tail they have; that is an
/// accepted edge case, not an error.
pub fn mask_value(current_value: Option<&str>) -> String {
    match current_value {
        None => "None".to_string(),
        Some(value) if value == NOT_SET => NOT_SET.to_string(),
        Some(value) => {
            // Last 4 characters, not bytes.
            let chars: Vec<char> = value.chars().collect();
            let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
            format!("{}{}", "*".repeat(16), tail)
        }
    }
}
