//! Command implementations, one module per top-level subcommand.

pub mod configure;
pub mod login;
pub mod logout;
