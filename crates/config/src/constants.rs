//! Shared constants for configuration resolution and persistence.
//!
//! Invariants:
//! - `NOT_SET` is a display sentinel, never written to disk.
//! - The two secret key names are the only keys routed to the
//!   credentials file by the configure flow.

/// Display sentinel for a setting with no resolved value.
pub const NOT_SET: &str = "<not set>";

/// Name of the implicit profile used when none is selected.
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// Top-level sections resolved outside of any profile.
pub const PREDEFINED_SECTION_NAMES: &[&str] = &["preview"];

/// Logical key for the API access key id (secret).
pub const ACCESS_KEY_ID_KEY_NAME: &str = "access_key_id";

/// Logical key for the API private key (secret).
pub const PRIVATE_KEY_KEY_NAME: &str = "private_key";

/// Logical key for the general service endpoint override.
pub const ENDPOINT_URL_KEY_NAME: &str = "endpoint_url";

/// Logical key for the control-plane API endpoint override.
pub const API_ENDPOINT_URL_KEY_NAME: &str = "api_endpoint_url";

/// Logical key for the service region.
pub const REGION_KEY_NAME: &str = "region";

/// Logical key for the interactive-login URL override.
pub const LOGIN_URL_KEY_NAME: &str = "login_url";

/// Logical key for the login account id.
pub const ACCOUNT_ID_KEY_NAME: &str = "account_id";

/// Logical key for the login identity provider.
pub const IDENTITY_PROVIDER_KEY_NAME: &str = "identity_provider";

/// Pseudo-key in an update set that redirects the write to a named section.
pub const SECTION_OVERRIDE_KEY: &str = "__section__";

/// Comment block written once at the top of a freshly created
/// credentials file.
pub const CREDENTIAL_FILE_COMMENT: &str = "Note on private key format.\n\
We expect the private key to be in a modified PEM\n\
format in which newlines are replaced with \\n.";

/// Default interactive-login deadline.
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 600;

/// Path expected by the login callback listener.
pub const LOGIN_CALLBACK_PATH: &str = "/interactiveLogin";
