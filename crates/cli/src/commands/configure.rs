//! The `configure` command family: interactive prompt flow, `get`,
//! `set`, and `list`.
//!
//! Responsibilities:
//! - Route changed keys to the right file: the two secret keys go to the
//!   credentials file (bare profile section, with the one-time comment),
//!   everything else goes to the config file (`profile <name>` section).
//! - Re-encode literal newlines in private keys as `\n` before writing.
//!
//! Invariants:
//! - Answers are persisted verbatim; an empty response means "keep the
//!   current value", so an all-empty prompt session writes nothing.
//! - `get` misses print nothing and signal failure through the exit code.

use std::io::Write;

use serde_json::{Map, Value};

use nimbus_config::constants::{
    API_ENDPOINT_URL_KEY_NAME, ENDPOINT_URL_KEY_NAME, PREDEFINED_SECTION_NAMES, REGION_KEY_NAME,
    SECTION_OVERRIDE_KEY,
};
use nimbus_config::writer::{ConfigWriter, UpdateValues};
use nimbus_config::{
    ACCESS_KEY_ID_KEY_NAME, CREDENTIAL_FILE_COMMENT, ConfigError, Context,
    DEFAULT_PROFILE_NAME, NOT_SET, PRIVATE_KEY_KEY_NAME, mask_value, resolve_path,
};

use crate::error::ExitCode;
use crate::prompt::ValueSource;

/// Keys the interactive flow prompts for, in order, with their labels.
const PROMPT_VALUES: &[(&str, &str)] = &[
    (ACCESS_KEY_ID_KEY_NAME, "Nimbus Access Key ID"),
    (PRIVATE_KEY_KEY_NAME, "Nimbus Private Key"),
    (REGION_KEY_NAME, "Region"),
];

fn is_secret_key(key: &str) -> bool {
    key == ACCESS_KEY_ID_KEY_NAME || key == PRIVATE_KEY_KEY_NAME
}

/// Private keys are stored single-line with literal newlines re-encoded.
fn encode_private_key(value: &str) -> String {
    value.replace('\n', "\\n")
}

/// Scoped config for prompting flows: a missing explicit profile starts
/// from an empty configuration instead of failing.
fn scoped_or_empty(ctx: &Context) -> anyhow::Result<Map<String, Value>> {
    match ctx.get_scoped_config() {
        Ok(scoped) => Ok(scoped),
        Err(ConfigError::ProfileNotFound(_)) => Ok(Map::new()),
        Err(err) => Err(err.into()),
    }
}

/// Interactive `nimbus configure`: prompt for each key, then persist
/// whatever actually changed.
pub fn run_interactive(
    ctx: &Context,
    source: &mut dyn ValueSource,
    writer: &dyn ConfigWriter,
) -> anyhow::Result<ExitCode> {
    let scoped = scoped_or_empty(ctx)?;

    let mut new_values = UpdateValues::new();
    for (key, label) in PROMPT_VALUES {
        let current = scoped.get(*key).and_then(Value::as_str);
        // Answers are taken verbatim; only an empty response means "keep".
        if let Some(answer) = source.get_value(current, key, label)? {
            if Some(answer.as_str()) != current {
                new_values.insert(key.to_string(), answer);
            }
        }
    }

    // Endpoint overrides supplied as global flags are persisted alongside
    // the prompted values.
    for key in [ENDPOINT_URL_KEY_NAME, API_ENDPOINT_URL_KEY_NAME] {
        if let Some(value) = ctx.manual(key) {
            new_values.insert(key.to_string(), value.to_string());
        }
    }

    if new_values.is_empty() {
        return Ok(ExitCode::Success);
    }

    let profile = ctx.effective_profile();

    let mut credential_values = UpdateValues::new();
    for key in [ACCESS_KEY_ID_KEY_NAME, PRIVATE_KEY_KEY_NAME] {
        if let Some(value) = new_values.remove(key) {
            let value = if key == PRIVATE_KEY_KEY_NAME {
                encode_private_key(&value)
            } else {
                value
            };
            credential_values.insert(key.to_string(), value);
        }
    }
    if !credential_values.is_empty() {
        if profile != DEFAULT_PROFILE_NAME {
            credential_values.insert(SECTION_OVERRIDE_KEY.to_string(), profile.clone());
        }
        writer.update_config(
            &credential_values,
            &ctx.credentials_file_path()?,
            Some(CREDENTIAL_FILE_COMMENT),
        )?;
    }

    // The config-file update is always issued once anything changed; the
    // writer no-ops when the remaining mapping is empty.
    let mut config_values = new_values;
    if profile != DEFAULT_PROFILE_NAME {
        config_values.insert(
            SECTION_OVERRIDE_KEY.to_string(),
            format!("profile {profile}"),
        );
    }
    writer.update_config(&config_values, &ctx.config_file_path()?, None)?;
    Ok(ExitCode::Success)
}

/// `nimbus configure get NAME`: print the value, or exit 1 silently.
pub fn run_get(ctx: &Context, name: &str, out: &mut dyn Write) -> anyhow::Result<ExitCode> {
    let full = ctx.full_config()?;
    let profile = ctx.effective_profile();
    match resolve_path(&full, &profile, name) {
        Some(value) => {
            writeln!(out, "{value}")?;
            Ok(ExitCode::Success)
        }
        None => Ok(ExitCode::GeneralError),
    }
}

/// Where a `set` target lands.
enum SetScope {
    /// A profile section; bare name, `profile ` prefix added for the
    /// config file.
    Profile(String),
    /// A reserved top-level section such as `preview`.
    TopLevel(String),
}

/// Splits a `set` name into its target section and remaining key per the
/// qualification rules: `default.`, `profile.<name>.`, a two-part
/// reserved-section form, or the active profile with the whole name as
/// the key.
fn split_set_name(name: &str, active_profile: &str) -> (SetScope, String) {
    let parts: Vec<&str> = name.split('.').collect();
    match parts.as_slice() {
        [first, rest @ ..] if *first == DEFAULT_PROFILE_NAME && !rest.is_empty() => {
            (SetScope::Profile(DEFAULT_PROFILE_NAME.to_string()), rest.join("."))
        }
        ["profile", profile, rest @ ..] if !rest.is_empty() => {
            (SetScope::Profile(profile.to_string()), rest.join("."))
        }
        [section, key] if PREDEFINED_SECTION_NAMES.contains(section) => {
            (SetScope::TopLevel(section.to_string()), key.to_string())
        }
        _ => (SetScope::Profile(active_profile.to_string()), name.to_string()),
    }
}

/// `nimbus configure set NAME VALUE`.
pub fn run_set(
    ctx: &Context,
    name: &str,
    value: &str,
    writer: &dyn ConfigWriter,
) -> anyhow::Result<ExitCode> {
    let (scope, key) = split_set_name(name, &ctx.effective_profile());

    let mut values = UpdateValues::new();
    match scope {
        SetScope::Profile(profile) if is_secret_key(&key) => {
            let value = if key == PRIVATE_KEY_KEY_NAME {
                encode_private_key(value)
            } else {
                value.to_string()
            };
            values.insert(key, value);
            if profile != DEFAULT_PROFILE_NAME {
                values.insert(SECTION_OVERRIDE_KEY.to_string(), profile);
            }
            writer.update_config(
                &values,
                &ctx.credentials_file_path()?,
                Some(CREDENTIAL_FILE_COMMENT),
            )?;
        }
        SetScope::Profile(profile) => {
            values.insert(key, value.to_string());
            if profile != DEFAULT_PROFILE_NAME {
                values.insert(
                    SECTION_OVERRIDE_KEY.to_string(),
                    format!("profile {profile}"),
                );
            }
            writer.update_config(&values, &ctx.config_file_path()?, None)?;
        }
        SetScope::TopLevel(section) => {
            values.insert(key, value.to_string());
            values.insert(SECTION_OVERRIDE_KEY.to_string(), section);
            writer.update_config(&values, &ctx.config_file_path()?, None)?;
        }
    }
    Ok(ExitCode::Success)
}

/// One `configure list` row, 30-char truncated with a trailing `...`.
fn list_row(out: &mut dyn Write, name: &str, value: &str, kind: &str, location: &str) -> std::io::Result<()> {
    let value = if value.chars().count() > 30 {
        let head: String = value.chars().take(27).collect();
        format!("{head}...")
    } else {
        value.to_string()
    };
    writeln!(out, "{name:>20} {value:>30} {kind:>24}    {location}")
}

/// `nimbus configure list`: resolved values with their sources, secrets
/// masked.
pub fn run_list(ctx: &Context, out: &mut dyn Write) -> anyhow::Result<ExitCode> {
    list_row(out, "Name", "Value", "Source Type", "Source")?;
    list_row(out, "----", "-----", "-----------", "------")?;

    let profile = ctx.resolve("profile")?;
    list_row(
        out,
        "profile",
        &profile.value,
        profile.source_kind.label(),
        &profile.source_location,
    )?;

    let credentials = ctx.get_credentials()?;
    match &credentials {
        Some(creds) => {
            use secrecy::ExposeSecret;
            list_row(
                out,
                ACCESS_KEY_ID_KEY_NAME,
                &mask_value(Some(&creds.access_key_id)),
                creds.method,
                "",
            )?;
            list_row(
                out,
                PRIVATE_KEY_KEY_NAME,
                &mask_value(Some(creds.private_key.expose_secret())),
                creds.method,
                "",
            )?;
        }
        None => {
            list_row(out, ACCESS_KEY_ID_KEY_NAME, NOT_SET, "None", "")?;
            list_row(out, PRIVATE_KEY_KEY_NAME, NOT_SET, "None", "")?;
        }
    }

    for name in [REGION_KEY_NAME, "endpoint_url", "api_endpoint_url"] {
        let value = ctx.resolve(name)?;
        list_row(
            out,
            name,
            &value.value,
            value.source_kind.label(),
            &value.source_location,
        )?;
    }
    Ok(ExitCode::Success)
}
