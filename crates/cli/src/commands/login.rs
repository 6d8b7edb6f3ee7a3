//! The `login` command: browser login orchestration and credential
//! persistence.
//!
//! Responsibilities:
//! - Resolve the account id, identity provider, and login URL from CLI
//!   flags and the active profile.
//! - Drive the callback flow and persist (or print) the returned pair.
//!
//! Invariants:
//! - Nothing is written on timeout or validation failure.
//! - With `--no-save-token` the pair goes to stdout as JSON and the
//!   credentials file is not touched.

use std::io::Write;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::Value;

use nimbus_config::constants::SECTION_OVERRIDE_KEY;
use nimbus_config::writer::{ConfigWriter, UpdateValues};
use nimbus_config::{
    ACCESS_KEY_ID_KEY_NAME, CREDENTIAL_FILE_COMMENT, ConfigError, ConfigValue, Context,
    DEFAULT_PROFILE_NAME, PRIVATE_KEY_KEY_NAME,
};

use crate::args::LoginArgs;
use crate::error::ExitCode;
use crate::login::{BrowserOpener, LoginFlow, LoginUrlBase, build_login_url};
use crate::skeleton::{GenerateCliSkeletonArg, Shape};

fn login_input_shape() -> Shape {
    serde_json::from_value(serde_json::json!({
        "type": "object",
        "members": {
            "accountId": {"type": "string"},
            "identityProvider": {"type": "string"},
            "loginUrl": {"type": "string"},
            "port": {"type": "integer"},
            "timeoutSeconds": {"type": "integer"},
            "saveToken": {"type": "boolean"}
        }
    }))
    .expect("login input shape is well-formed")
}

/// Flag value, then the active profile's setting.
fn flag_or_profile(
    flag: &Option<String>,
    scoped: &serde_json::Map<String, Value>,
    key: &str,
) -> Option<String> {
    flag.clone()
        .or_else(|| scoped.get(key).and_then(Value::as_str).map(str::to_string))
}

pub async fn run(
    ctx: &Context,
    args: &LoginArgs,
    writer: &dyn ConfigWriter,
    opener: &dyn BrowserOpener,
    out: &mut dyn Write,
) -> anyhow::Result<ExitCode> {
    let skeleton_arg = GenerateCliSkeletonArg::new(args.generate_cli_skeleton);
    if !skeleton_arg.invoke(Some(&login_input_shape()), &mut *out)? {
        return Ok(ExitCode::Success);
    }

    let scoped = match ctx.get_scoped_config() {
        Ok(scoped) => scoped,
        Err(ConfigError::ProfileNotFound(_)) => serde_json::Map::new(),
        Err(err) => return Err(err.into()),
    };

    let account_id = flag_or_profile(&args.account_id, &scoped, "account_id");
    let identity_provider =
        flag_or_profile(&args.identity_provider, &scoped, "identity_provider");
    let login_url = flag_or_profile(&args.login_url, &scoped, "login_url");

    // Like the scoped config above, a not-yet-configured explicit profile
    // has no region; the flow falls back to the default console.
    let region = match ctx.resolve("region") {
        Ok(region) => region,
        Err(ConfigError::ProfileNotFound(_)) => ConfigValue::not_set(),
        Err(err) => return Err(err.into()),
    };
    let base = match login_url {
        Some(url) => LoginUrlBase::Explicit(url),
        None => LoginUrlBase::Console {
            region: region.is_set().then_some(region.value),
        },
    };

    // Bind before launching the browser so the callback cannot race the
    // listener.
    let flow = LoginFlow::bind(args.port).await?;
    let url = build_login_url(
        base,
        account_id.as_deref(),
        identity_provider.as_deref(),
        &flow.return_url(),
    )?;

    eprintln!("Opening browser for login. If it does not open, visit:\n  {url}");
    if let Err(err) = opener.open(url.as_str()) {
        tracing::warn!(error = %err, "Failed to launch browser");
        eprintln!("Could not launch a browser; open the URL above manually.");
    }

    let credentials = flow
        .await_callback(Duration::from_secs(args.timeout))
        .await?;
    let private_key = credentials
        .private_key
        .expose_secret()
        .replace('\n', "\\n");

    if args.no_save_token {
        let document = serde_json::json!({
            "accessKeyId": credentials.access_key_id,
            "privateKey": private_key,
        });
        serde_json::to_writer_pretty(&mut *out, &document)?;
        writeln!(out)?;
        return Ok(ExitCode::Success);
    }

    let profile = ctx.effective_profile();
    let mut values = UpdateValues::new();
    values.insert(ACCESS_KEY_ID_KEY_NAME.to_string(), credentials.access_key_id);
    values.insert(PRIVATE_KEY_KEY_NAME.to_string(), private_key);
    if profile != DEFAULT_PROFILE_NAME {
        values.insert(SECTION_OVERRIDE_KEY.to_string(), profile.clone());
    }
    writer.update_config(
        &values,
        &ctx.credentials_file_path()?,
        Some(CREDENTIAL_FILE_COMMENT),
    )?;
    eprintln!("Credentials saved for profile '{profile}'.");
    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use serial_test::serial;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    use crate::login::LoginError;

    /// Captures the URL instead of opening a browser.
    #[derive(Default, Clone)]
    struct RecordingOpener {
        url: Arc<Mutex<Option<String>>>,
    }

    impl BrowserOpener for RecordingOpener {
        fn open(&self, url: &str) -> anyhow::Result<()> {
            *self.url.lock().unwrap() = Some(url.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        calls: Mutex<Vec<(UpdateValues, std::path::PathBuf, Option<String>)>>,
    }

    impl ConfigWriter for RecordingWriter {
        fn update_config(
            &self,
            new_values: &UpdateValues,
            path: &std::path::Path,
            comment: Option<&str>,
        ) -> Result<(), ConfigError> {
            self.calls.lock().unwrap().push((
                new_values.clone(),
                path.to_path_buf(),
                comment.map(str::to_string),
            ));
            Ok(())
        }
    }

    fn login_args() -> LoginArgs {
        LoginArgs {
            account_id: Some("1234".to_string()),
            identity_provider: None,
            login_url: None,
            port: None,
            timeout: 10,
            no_save_token: false,
            generate_cli_skeleton: false,
        }
    }

    /// Points both settings files into a temp dir and scrubs the profile
    /// and region env vars for the duration of the future.
    async fn with_env_files<F: std::future::Future<Output = ()>>(f: F) {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config");
        let creds = dir.path().join("credentials");
        std::fs::write(&config, "").unwrap();
        std::fs::write(&creds, "").unwrap();
        temp_env::async_with_vars(
            [
                ("NIMBUS_CONFIG_FILE", Some(config.display().to_string())),
                (
                    "NIMBUS_SHARED_CREDENTIALS_FILE",
                    Some(creds.display().to_string()),
                ),
                ("NIMBUS_DEFAULT_PROFILE", None),
                ("NIMBUS_PROFILE", None),
                ("NIMBUS_REGION", None),
            ],
            f,
        )
        .await;
    }

    /// Extracts the callback port from the returnUrl the opener captured,
    /// then fires the callback against it.
    async fn fire_callback(opener: RecordingOpener, query: &'static str) {
        let url = loop {
            if let Some(url) = opener.url.lock().unwrap().clone() {
                break url;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        let parsed = url::Url::parse(&url).unwrap();
        let return_url = parsed
            .query_pairs()
            .find(|(k, _)| k == "returnUrl")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let port = url::Url::parse(&return_url).unwrap().port().unwrap();
        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();
        stream
            .write_all(
            format!("GET /interactiveLogin?{query} HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .as_bytes(),
            )
            .await
            .unwrap();
        stream.shutdown().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_login_saves_encoded_credentials() {
        with_env_files(async {
            let ctx = Context::new();
            let writer = RecordingWriter::default();
            let opener = RecordingOpener::default();
            let client = tokio::spawn(fire_callback(
                opener.clone(),
                "accessKeyId=AKID&privateKey=line1%0Aline2",
            ));
            let mut out = Vec::new();
            let code = run(&ctx, &login_args(), &writer, &opener, &mut out)
                .await
                .unwrap();
            client.await.unwrap();
            assert_eq!(code, ExitCode::Success);
            let calls = writer.calls.lock().unwrap();
            assert_eq!(calls.len(), 1);
            let (values, path, comment) = &calls[0];
            assert_eq!(values["access_key_id"], "AKID");
            assert_eq!(values["private_key"], "line1\\nline2");
            assert!(path.ends_with("credentials"));
            assert_eq!(comment.as_deref(), Some(CREDENTIAL_FILE_COMMENT));
            assert!(out.is_empty());
        })
        .await;
    }

    #[tokio::test]
    #[serial]
    async fn test_login_explicit_profile_targets_bare_section() {
        with_env_files(async {
            let mut ctx = Context::new();
            ctx.set_manual("profile", "myname");
            let writer = RecordingWriter::default();
            let opener = RecordingOpener::default();
            let client = tokio::spawn(fire_callback(
                opener.clone(),
                "accessKeyId=A&privateKey=P",
            ));
            let mut out = Vec::new();
            run(&ctx, &login_args(), &writer, &opener, &mut out)
                .await
                .unwrap();
            client.await.unwrap();
            let calls = writer.calls.lock().unwrap();
            assert_eq!(calls[0].0["__section__"], "myname");
            // The unconfigured profile has no region; the default console
            // host is used rather than failing resolution.
            let url = opener.url.lock().unwrap().clone().unwrap();
            assert!(url.starts_with("https://consoleauth.nimbus.cloud/login"));
        })
        .await;
    }

    #[tokio::test]
    #[serial]
    async fn test_login_timeout_writes_nothing() {
        with_env_files(async {
            let ctx = Context::new();
            let writer = RecordingWriter::default();
            let opener = RecordingOpener::default();
            let mut args = login_args();
            args.timeout = 1;
            let mut out = Vec::new();
            let err = run(&ctx, &args, &writer, &opener, &mut out)
                .await
                .unwrap_err();
            let login_err = err.downcast_ref::<LoginError>().unwrap();
            assert!(matches!(login_err, LoginError::Timeout(1)));
            assert!(writer.calls.lock().unwrap().is_empty());
        })
        .await;
    }

    #[tokio::test]
    #[serial]
    async fn test_login_validation_failure_writes_nothing() {
        with_env_files(async {
            let ctx = Context::new();
            let writer = RecordingWriter::default();
            let opener = RecordingOpener::default();
            let client =
                tokio::spawn(fire_callback(opener.clone(), "privateKey=only"));
            let mut out = Vec::new();
            let err = run(&ctx, &login_args(), &writer, &opener, &mut out)
                .await
                .unwrap_err();
            client.await.unwrap();
            let login_err = err.downcast_ref::<LoginError>().unwrap();
            assert!(
                matches!(login_err, LoginError::Validation(param) if param == "accessKeyId")
            );
            assert!(writer.calls.lock().unwrap().is_empty());
        })
        .await;
    }

    #[tokio::test]
    #[serial]
    async fn test_login_no_save_token_prints_json() {
        with_env_files(async {
            let ctx = Context::new();
            let writer = RecordingWriter::default();
            let opener = RecordingOpener::default();
            let client = tokio::spawn(fire_callback(
                opener.clone(),
                "accessKeyId=AKID&privateKey=PK",
            ));
            let mut args = login_args();
            args.no_save_token = true;
            let mut out = Vec::new();
            run(&ctx, &args, &writer, &opener, &mut out).await.unwrap();
            client.await.unwrap();
            assert!(writer.calls.lock().unwrap().is_empty());
            let document: Value =
                serde_json::from_slice(&out).unwrap();
            assert_eq!(document["accessKeyId"], "AKID");
            assert_eq!(document["privateKey"], "PK");
        })
        .await;
    }

    #[tokio::test]
    #[serial]
    async fn test_login_missing_account_id_is_fatal() {
        with_env_files(async {
            let ctx = Context::new();
            let writer = RecordingWriter::default();
            let opener = RecordingOpener::default();
            let mut args = login_args();
            args.account_id = None;
            let mut out = Vec::new();
            let err = run(&ctx, &args, &writer, &opener, &mut out)
                .await
                .unwrap_err();
            let login_err = err.downcast_ref::<LoginError>().unwrap();
            assert!(
                matches!(login_err, LoginError::MissingArgument(arg) if arg == "account-id")
            );
        })
        .await;
    }

    #[tokio::test]
    #[serial]
    async fn test_login_skeleton_flag_skips_the_flow() {
        with_env_files(async {
            let ctx = Context::new();
            let writer = RecordingWriter::default();
            let opener = RecordingOpener::default();
            let mut args = login_args();
            args.generate_cli_skeleton = true;
            let mut out = Vec::new();
            let code = run(&ctx, &args, &writer, &opener, &mut out).await.unwrap();
            assert_eq!(code, ExitCode::Success);
            assert!(opener.url.lock().unwrap().is_none());
            assert!(writer.calls.lock().unwrap().is_empty());
            let document: Value = serde_json::from_slice(&out).unwrap();
            assert_eq!(document["accountId"], "");
            assert_eq!(document["saveToken"], false);
        })
        .await;
    }
}
