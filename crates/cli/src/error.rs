//! CLI exit codes for scripting and automation.
//!
//! Responsibilities:
//! - Define structured exit codes that scripts can use to distinguish
//!   failure modes.
//! - Map login-flow errors to appropriate exit codes.
//!
//! Does NOT handle:
//! - Error message formatting (handled by anyhow Display).
//!
//! Invariants:
//! - `configure get` misses exit 1 with no output; that path never goes
//!   through an error value at all.

use crate::login::LoginError;

/// Structured exit codes for the `nimbus` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Command completed successfully.
    Success = 0,

    /// Unhandled or generic failure.
    GeneralError = 1,

    /// The browser login callback never arrived within the deadline.
    ///
    /// Scripts may retry with a longer `--timeout`.
    LoginTimeout = 3,

    /// Invalid input: a malformed callback or a missing required
    /// argument. Scripts should fix the invocation, not retry.
    ValidationError = 5,
}

impl ExitCode {
    /// Convert the exit code to an i32 for use with std::process::exit().
    pub const fn as_i32(self) -> i32 {
        self as u8 as i32
    }
}

impl From<&LoginError> for ExitCode {
    fn from(err: &LoginError) -> Self {
        match err {
            LoginError::Timeout(_) => ExitCode::LoginTimeout,
            LoginError::Validation(_)
            | LoginError::MissingArgument(_)
            | LoginError::InvalidLoginUrl(_) => ExitCode::ValidationError,
            LoginError::Bind { .. } | LoginError::Io(_) => ExitCode::GeneralError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_error_mapping() {
        assert_eq!(ExitCode::from(&LoginError::Timeout(1)).as_i32(), 3);
        assert_eq!(
            ExitCode::from(&LoginError::Validation("privateKey".into())).as_i32(),
            5
        );
        assert_eq!(
            ExitCode::from(&LoginError::MissingArgument("account-id".into())).as_i32(),
            5
        );
    }
}
