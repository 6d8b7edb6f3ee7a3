//! CLI argument definitions and parsing.
//!
//! Responsibilities:
//! - Define the CLI structure using clap derive macros.
//! - Parse command-line arguments.
//!
//! Non-responsibilities:
//! - Does not execute commands (see the `commands` modules).
//! - Does not resolve configuration precedence; the global flags here are
//!   fed into the resolution context as manual overrides, and environment
//!   variables are read by the context itself so flag > env ordering
//!   holds.

use clap::{Args, Parser, Subcommand};

use nimbus_config::constants::DEFAULT_LOGIN_TIMEOUT_SECS;

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "Nimbus CLI - Manage the Nimbus control plane from the command line", long_about = None)]
#[command(version)]
#[command(
    after_help = "Examples:\n  nimbus configure\n  nimbus configure get profile.testing.access_key_id\n  nimbus configure set region eu-1\n  nimbus --profile production configure list\n  nimbus login --account-id 1234 --timeout 120\n  nimbus logout\n"
)]
pub struct Cli {
    /// Profile to use for this invocation
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Override the service endpoint URL
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// Override the control-plane API endpoint URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_endpoint_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Configure credentials and settings
    Configure {
        #[command(subcommand)]
        action: Option<ConfigureAction>,
    },

    /// Obtain credentials through a browser login
    Login(LoginArgs),

    /// Clear the stored credentials for the active profile
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigureAction {
    /// Print one configuration value
    Get {
        /// Setting name, optionally dotted (e.g. profile.dev.region)
        name: String,
    },

    /// Set one configuration value
    Set {
        /// Setting name, optionally section-qualified
        name: String,
        value: String,
    },

    /// Show the resolved configuration and where each value came from
    List,
}

#[derive(Args)]
pub struct LoginArgs {
    /// Account to log in to (required unless a login URL carries it)
    #[arg(long, value_name = "ID")]
    pub account_id: Option<String>,

    /// Identity provider to route the login through
    #[arg(long, value_name = "IDP")]
    pub identity_provider: Option<String>,

    /// Full login URL, overriding the default console URL
    #[arg(long, value_name = "URL")]
    pub login_url: Option<String>,

    /// Local port for the browser callback (default: OS-assigned)
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Seconds to wait for the browser callback
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_LOGIN_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Print the credentials as JSON instead of saving them
    #[arg(long)]
    pub no_save_token: bool,

    /// Print a sample input document and exit without logging in
    #[arg(long)]
    pub generate_cli_skeleton: bool,
}
