//! Configuration management for the Nimbus CLI.
//!
//! This crate provides the layered configuration resolver (CLI flag >
//! environment > config file > not set), the credential chain, secret
//! masking, and the merge-writing persistence layer for the two settings
//! files (`config` and `credentials`).

pub mod constants;
mod context;
mod dotted;
mod error;
mod file;
mod value;
pub mod writer;

pub use constants::{
    ACCESS_KEY_ID_KEY_NAME, CREDENTIAL_FILE_COMMENT, DEFAULT_PROFILE_NAME, NOT_SET,
    PRIVATE_KEY_KEY_NAME,
};
pub use context::{Context, Credentials, load_dotenv};
pub use dotted::resolve_path;
pub use error::ConfigError;
pub use value::{ConfigValue, SourceKind, mask_value};
pub use writer::{ConfigFileWriter, ConfigWriter, UpdateValues};
