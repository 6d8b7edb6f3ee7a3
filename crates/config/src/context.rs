//! Layered configuration resolution and the credential chain.
//!
//! Responsibilities:
//! - Resolve logical settings with strict precedence: CLI flag >
//!   environment variable > config file (scoped to the active profile) >
//!   not set.
//! - Select the active profile and expose its scoped settings map.
//! - Resolve credentials through the provider chain: environment pair,
//!   shared credentials file, config file.
//! - Locate the config and credentials files, honoring env overrides.
//!
//! Does NOT handle:
//! - Writing settings back to disk (see `writer.rs`).
//! - Free-form dotted-path lookups (see `dotted.rs`).
//!
//! Invariants:
//! - A higher-precedence source always wins, even over a non-empty
//!   lower-precedence one.
//! - An explicitly selected profile that does not exist is an error; the
//!   implicit default profile is never an error when absent.
//! - The private key is held as a `SecretString` from the moment it is
//!   read and never appears in logs or error messages.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use secrecy::SecretString;
use serde_json::{Map, Value};

use crate::constants::{
    ACCESS_KEY_ID_KEY_NAME, ACCOUNT_ID_KEY_NAME, API_ENDPOINT_URL_KEY_NAME,
    DEFAULT_PROFILE_NAME, ENDPOINT_URL_KEY_NAME, IDENTITY_PROVIDER_KEY_NAME, LOGIN_URL_KEY_NAME,
    PRIVATE_KEY_KEY_NAME, REGION_KEY_NAME,
};
use crate::error::ConfigError;
use crate::file;
use crate::value::{ConfigValue, SourceKind};

pub const ENV_DEFAULT_PROFILE: &str = "NIMBUS_DEFAULT_PROFILE";
pub const ENV_PROFILE: &str = "NIMBUS_PROFILE";
pub const ENV_CONFIG_FILE: &str = "NIMBUS_CONFIG_FILE";
pub const ENV_SHARED_CREDENTIALS_FILE: &str = "NIMBUS_SHARED_CREDENTIALS_FILE";
pub const ENV_ACCESS_KEY_ID: &str = "NIMBUS_ACCESS_KEY_ID";
pub const ENV_PRIVATE_KEY: &str = "NIMBUS_PRIVATE_KEY";

/// One registered logical setting: its config-file key (if it lives in
/// the config file at all) and its environment aliases, checked in order.
struct ContextVar {
    name: &'static str,
    config_key: Option<&'static str>,
    env_vars: &'static [&'static str],
}

const CONTEXT_VAR_MAP: &[ContextVar] = &[
    ContextVar {
        name: "profile",
        config_key: None,
        env_vars: &[ENV_DEFAULT_PROFILE, ENV_PROFILE],
    },
    ContextVar {
        name: "config_file",
        config_key: None,
        env_vars: &[ENV_CONFIG_FILE],
    },
    ContextVar {
        name: "credentials_file",
        config_key: None,
        env_vars: &[ENV_SHARED_CREDENTIALS_FILE],
    },
    ContextVar {
        name: "region",
        config_key: Some(REGION_KEY_NAME),
        env_vars: &["NIMBUS_REGION"],
    },
    ContextVar {
        name: "endpoint_url",
        config_key: Some(ENDPOINT_URL_KEY_NAME),
        env_vars: &["NIMBUS_ENDPOINT_URL"],
    },
    ContextVar {
        name: "api_endpoint_url",
        config_key: Some(API_ENDPOINT_URL_KEY_NAME),
        env_vars: &["NIMBUS_API_ENDPOINT_URL"],
    },
    ContextVar {
        name: "account_id",
        config_key: Some(ACCOUNT_ID_KEY_NAME),
        env_vars: &[],
    },
    ContextVar {
        name: "identity_provider",
        config_key: Some(IDENTITY_PROVIDER_KEY_NAME),
        env_vars: &[],
    },
    ContextVar {
        name: "login_url",
        config_key: Some(LOGIN_URL_KEY_NAME),
        env_vars: &[],
    },
];

/// Credentials resolved by the provider chain.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub private_key: SecretString,
    /// Which provider produced the pair: `env`,
    /// `shared-credentials-file`, or `config-file`.
    pub method: &'static str,
}

/// Resolution context for one invocation: the CLI-supplied overrides plus
/// access to the environment and the settings files.
#[derive(Debug, Default)]
pub struct Context {
    manual_values: BTreeMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a CLI-flag override for a logical setting name.
    pub fn set_manual(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.manual_values.insert(name.into(), value.into());
    }

    /// The CLI-flag override recorded for a logical setting name, if any.
    pub fn manual(&self, name: &str) -> Option<&str> {
        self.manual_values.get(name).map(String::as_str)
    }

    /// The active profile name and whether it was explicitly selected
    /// (flag or environment) rather than the implicit default.
    pub fn profile_selection(&self) -> (String, bool) {
        if let Some(profile) = self.manual_values.get("profile") {
            return (profile.clone(), true);
        }
        for var in [ENV_DEFAULT_PROFILE, ENV_PROFILE] {
            if let Some(profile) = env_non_empty(var) {
                return (profile, true);
            }
        }
        (DEFAULT_PROFILE_NAME.to_string(), false)
    }

    pub fn effective_profile(&self) -> String {
        self.profile_selection().0
    }

    /// Path of the config file: env override, else the platform config
    /// directory.
    pub fn config_file_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = env_non_empty(ENV_CONFIG_FILE) {
            return Ok(PathBuf::from(path));
        }
        Ok(default_config_dir()?.join("config"))
    }

    /// Path of the shared credentials file: env override, else alongside
    /// the config file.
    pub fn credentials_file_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = env_non_empty(ENV_SHARED_CREDENTIALS_FILE) {
            return Ok(PathBuf::from(path));
        }
        Ok(default_config_dir()?.join("credentials"))
    }

    /// The full configuration tree: profile map (config and credentials
    /// files merged) plus top-level sections.
    pub fn full_config(&self) -> Result<Map<String, Value>, ConfigError> {
        file::load_full_config(&self.config_file_path()?, &self.credentials_file_path()?)
    }

    /// The active profile's settings map.
    ///
    /// An explicitly selected profile that is absent from both files is
    /// `ProfileNotFound`; a missing implicit default is an empty map.
    pub fn get_scoped_config(&self) -> Result<Map<String, Value>, ConfigError> {
        let (profile, explicit) = self.profile_selection();
        let full = self.full_config()?;
        let found = full
            .get("profiles")
            .and_then(Value::as_object)
            .and_then(|profiles| profiles.get(&profile))
            .and_then(Value::as_object)
            .cloned();
        match found {
            Some(scoped) => Ok(scoped),
            None if explicit => Err(ConfigError::ProfileNotFound(profile)),
            None => Ok(Map::new()),
        }
    }

    /// Resolves one logical setting with flag > env > config-file
    /// precedence, reporting the winning source.
    pub fn resolve(&self, name: &str) -> Result<ConfigValue, ConfigError> {
        if let Some(value) = self.manual_values.get(name) {
            let flag = format!("--{}", name.replace('_', "-"));
            return Ok(ConfigValue::new(value.clone(), SourceKind::Manual, flag));
        }
        let var = CONTEXT_VAR_MAP.iter().find(|v| v.name == name);
        if let Some(var) = var {
            for env_name in var.env_vars {
                if let Some(value) = env_non_empty(env_name) {
                    return Ok(ConfigValue::new(value, SourceKind::Environment, *env_name));
                }
            }
        }
        // Unregistered names fall through to a config-file lookup under
        // the name itself.
        let config_key = var.map_or(Some(name), |v| v.config_key);
        if let Some(config_key) = config_key {
            let scoped = self.get_scoped_config()?;
            if let Some(Value::String(value)) = scoped.get(config_key) {
                let location = self.config_file_path()?.display().to_string();
                return Ok(ConfigValue::new(
                    value.clone(),
                    SourceKind::ConfigFile,
                    location,
                ));
            }
        }
        Ok(ConfigValue::not_set())
    }

    /// Walks the credential provider chain and returns the first complete
    /// pair, or `None` when no provider has one. Blank values do not
    /// count as present, so a logged-out profile resolves to `None`.
    pub fn get_credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        if let (Some(access_key_id), Some(private_key)) =
            (env_non_empty(ENV_ACCESS_KEY_ID), env_non_empty(ENV_PRIVATE_KEY))
        {
            tracing::debug!("Resolved credentials from environment");
            return Ok(Some(Credentials {
                access_key_id,
                private_key: SecretString::from(private_key),
                method: "env",
            }));
        }

        let (profile, explicit) = self.profile_selection();

        let shared = file::raw_config_parse(&self.credentials_file_path()?)?;
        if let Some(pair) = credential_pair(shared.get(&profile)) {
            tracing::debug!(profile = %profile, "Resolved credentials from shared credentials file");
            return Ok(Some(Credentials {
                access_key_id: pair.0,
                private_key: SecretString::from(pair.1),
                method: "shared-credentials-file",
            }));
        }

        let raw = file::raw_config_parse(&self.config_file_path()?)?;
        let section_name = if profile == DEFAULT_PROFILE_NAME {
            profile.clone()
        } else {
            format!("profile {profile}")
        };
        if let Some(pair) = credential_pair(raw.get(&section_name)) {
            tracing::debug!(profile = %profile, "Resolved credentials from config file");
            return Ok(Some(Credentials {
                access_key_id: pair.0,
                private_key: SecretString::from(pair.1),
                method: "config-file",
            }));
        }

        if explicit && !shared.contains_key(&profile) && !raw.contains_key(&section_name) {
            // Surface a typo'd --profile instead of silently reporting
            // missing credentials.
            let full = self.full_config()?;
            let known = full
                .get("profiles")
                .and_then(Value::as_object)
                .is_some_and(|profiles| profiles.contains_key(&profile));
            if !known {
                return Err(ConfigError::ProfileNotFound(profile));
            }
        }
        Ok(None)
    }
}

/// Extracts a non-blank access key / private key pair from a section.
fn credential_pair(section: Option<&Value>) -> Option<(String, String)> {
    let section = section?.as_object()?;
    let access_key_id = section.get(ACCESS_KEY_ID_KEY_NAME)?.as_str()?;
    let private_key = section.get(PRIVATE_KEY_KEY_NAME)?.as_str()?;
    if access_key_id.is_empty() || private_key.is_empty() {
        return None;
    }
    Some((access_key_id.to_string(), private_key.to_string()))
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn default_config_dir() -> Result<PathBuf, ConfigError> {
    directories::ProjectDirs::from("", "", "nimbus")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| {
            ConfigError::ConfigDirUnavailable("no home directory available".to_string())
        })
}

/// Loads `.env` into the process environment before CLI parsing.
///
/// Skipped entirely when `DOTENV_DISABLED` is set to `1` or `true`. A
/// missing `.env` file is fine; parse failures report only the byte
/// index, never the offending line.
pub fn load_dotenv() -> Result<(), ConfigError> {
    let disabled = std::env::var("DOTENV_DISABLED")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if disabled {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(err)) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(dotenvy::Error::LineParse(_, error_index)) => {
            Err(ConfigError::DotenvParse { error_index })
        }
        Err(dotenvy::Error::Io(err)) => Err(ConfigError::DotenvIo { kind: err.kind() }),
        Err(_) => Err(ConfigError::DotenvUnknown),
    }
}
