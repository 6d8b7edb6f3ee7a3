//! Browser login flow: local callback listener and login-URL building.
//!
//! Responsibilities:
//! - Bind a localhost listener (explicit port or OS-ephemeral).
//! - Build the external login URL with return URL, account id, and
//!   identity provider.
//! - Wait (bounded) for the browser callback and extract the credential
//!   pair from its query parameters.
//!
//! Does NOT handle:
//! - Persisting the credentials (see `commands/login.rs`).
//! - Resolving the account id or login URL from configuration.
//!
//! Invariants:
//! - Requests for other paths get 404 and do not consume the wait.
//! - An `error` query parameter is reported and the wait continues; a
//!   callback missing a credential parameter ends the flow with a
//!   validation error.
//! - The listener is bound before the browser is launched, so the
//!   callback can never race the bind.
//! - Credential values never appear in log output.

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use nimbus_config::constants::LOGIN_CALLBACK_PATH;

const CLOSE_BROWSER_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>Nimbus CLI</title></head>\n<body>\n<p>Login complete. You may close this browser window and return to the terminal.</p>\n</body>\n</html>\n";

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Timed out waiting for the browser login callback after {0} seconds")]
    Timeout(u64),

    #[error("Login callback missing required parameter '{0}'")]
    Validation(String),

    #[error("Missing required argument '{0}'")]
    MissingArgument(String),

    #[error("Invalid login URL '{0}'")]
    InvalidLoginUrl(String),

    #[error("Failed to bind login callback listener on port {port}: {source}")]
    Bind {
        port: u16,
        source: std::io::Error,
    },

    #[error("IO error during login callback: {0}")]
    Io(#[from] std::io::Error),
}

/// Credential pair delivered by the browser callback.
#[derive(Debug)]
pub struct LoginCredentials {
    pub access_key_id: String,
    pub private_key: SecretString,
}

/// Finds a currently unused local port by binding port 0 and releasing it.
///
/// The port can be taken again between the release and the caller's bind;
/// callers that can keep the listener should prefer `LoginFlow::bind(None)`.
#[allow(dead_code)]
pub fn find_unused_port() -> Result<u16, LoginError> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))
        .map_err(|source| LoginError::Bind { port: 0, source })?;
    Ok(listener.local_addr()?.port())
}

/// A bound callback listener waiting for the browser to return.
#[derive(Debug)]
pub struct LoginFlow {
    listener: TcpListener,
    port: u16,
}

impl LoginFlow {
    /// Binds the callback listener on the given port, or an OS-assigned
    /// one when `port` is `None`.
    pub async fn bind(port: Option<u16>) -> Result<Self, LoginError> {
        let requested = port.unwrap_or(0);
        let listener = TcpListener::bind(("127.0.0.1", requested))
            .await
            .map_err(|source| LoginError::Bind {
                port: requested,
                source,
            })?;
        let port = listener.local_addr()?.port();
        tracing::debug!(port, "Login callback listener bound");
        Ok(Self { listener, port })
    }

    #[allow(dead_code)]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The return URL the login console redirects the browser back to.
    pub fn return_url(&self) -> String {
        format!("http://localhost:{}{}", self.port, LOGIN_CALLBACK_PATH)
    }

    /// Waits up to `timeout` for the credential callback, serving 404s to
    /// unrelated requests in the meantime. Consumes the flow; the
    /// listener is released when this returns.
    pub async fn await_callback(
        self,
        timeout: Duration,
    ) -> Result<LoginCredentials, LoginError> {
        let deadline = timeout.as_secs();
        match tokio::time::timeout(timeout, self.accept_loop()).await {
            Ok(result) => result,
            Err(_) => Err(LoginError::Timeout(deadline)),
        }
    }

    async fn accept_loop(&self) -> Result<LoginCredentials, LoginError> {
        loop {
            let (stream, _) = self.listener.accept().await?;
            if let Some(result) = handle_connection(stream).await? {
                return result;
            }
        }
    }
}

/// Handles one HTTP connection. `Ok(None)` means the request did not
/// settle the flow and the wait continues.
/// Upper bound on accumulated request bytes; browsers send callback
/// requests far smaller than this.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

async fn handle_connection(
    mut stream: TcpStream,
) -> Result<Option<Result<LoginCredentials, LoginError>>, LoginError> {
    // The request line and headers can arrive split across several TCP
    // segments; keep reading until the blank line that ends the headers.
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|window| window == b"\r\n\r\n") {
            break;
        }
        if buf.len() > MAX_REQUEST_BYTES {
            break;
        }
    }
    let request = String::from_utf8_lossy(&buf);

    let Some(target) = request_target(&request) else {
        respond(&mut stream, "400 Bad Request", "").await?;
        return Ok(None);
    };
    let Ok(url) = Url::parse(&format!("http://localhost{target}")) else {
        respond(&mut stream, "400 Bad Request", "").await?;
        return Ok(None);
    };

    if url.path() != LOGIN_CALLBACK_PATH {
        respond(&mut stream, "404 Not Found", "").await?;
        return Ok(None);
    }

    let mut access_key_id = None;
    let mut private_key = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "accessKeyId" => access_key_id = Some(value.into_owned()),
            "privateKey" => private_key = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        eprintln!("Login error reported by the console: {error}");
        respond(&mut stream, "200 OK", "").await?;
        return Ok(None);
    }

    match (access_key_id, private_key) {
        (Some(access_key_id), Some(private_key)) => {
            respond(&mut stream, "200 OK", CLOSE_BROWSER_PAGE).await?;
            Ok(Some(Ok(LoginCredentials {
                access_key_id,
                private_key: SecretString::from(private_key),
            })))
        }
        (missing_access, _) => {
            let missing = if missing_access.is_none() {
                "accessKeyId"
            } else {
                "privateKey"
            };
            respond(&mut stream, "400 Bad Request", "").await?;
            Ok(Some(Err(LoginError::Validation(missing.to_string()))))
        }
    }
}

fn request_target(request: &str) -> Option<&str> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    if method != "GET" {
        return None;
    }
    parts.next()
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<(), LoginError> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// How the base login URL was chosen; controls which query parameters are
/// appended.
pub enum LoginUrlBase {
    /// Explicit URL from the `--login-url` flag or the profile's
    /// `login_url` setting. Account id and idp are appended only when
    /// supplied.
    Explicit(String),
    /// Default console URL derived from the region. Requires an account
    /// id.
    Console { region: Option<String> },
}

const DEFAULT_REGION: &str = "us-west-1";

/// Builds the URL the browser is sent to. `return_url` always rides
/// along; the console redirects back to it with the credential pair.
pub fn build_login_url(
    base: LoginUrlBase,
    account_id: Option<&str>,
    identity_provider: Option<&str>,
    return_url: &str,
) -> Result<Url, LoginError> {
    let mut url = match base {
        LoginUrlBase::Explicit(raw) => {
            Url::parse(&raw).map_err(|_| LoginError::InvalidLoginUrl(raw))?
        }
        LoginUrlBase::Console { region } => {
            let region = region.as_deref().unwrap_or(DEFAULT_REGION);
            if account_id.is_none() {
                return Err(LoginError::MissingArgument("account-id".to_string()));
            }
            let raw = if region == DEFAULT_REGION {
                "https://consoleauth.nimbus.cloud/login".to_string()
            } else {
                format!("https://console.{region}.nimbus.cloud/consoleauth/login")
            };
            Url::parse(&raw).expect("default console URL is well-formed")
        }
    };

    {
        let mut pairs = url.query_pairs_mut();
        if let Some(account_id) = account_id {
            pairs.append_pair("accountId", account_id);
        }
        if let Some(idp) = identity_provider {
            pairs.append_pair("idp", idp);
        }
        pairs.append_pair("returnUrl", return_url);
    }
    Ok(url)
}

/// Browser-launch seam; tests substitute a recorder.
pub trait BrowserOpener {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Opens the system default browser.
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        webbrowser::open(url)?;
        Ok(())
    }
}
