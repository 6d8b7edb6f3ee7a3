//! Nimbus CLI - command-line client for the Nimbus control plane.
//!
//! Responsibilities:
//! - Parse command-line arguments and environment variables.
//! - Resolve layered configuration and dispatch to the command modules.
//!
//! Does NOT handle:
//! - Configuration resolution or persistence internals (see
//!   `crates/config`).
//!
//! Invariants:
//! - `load_dotenv()` is called BEFORE CLI parsing so `.env` can provide
//!   environment values for the resolution context.
//! - Global flags are fed into the context as manual overrides, keeping
//!   flag > env > config-file precedence in one place.

mod args;
mod commands;
mod error;
mod login;
mod prompt;
mod skeleton;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use args::{Cli, Command, ConfigureAction};
use error::ExitCode;
use login::{LoginError, SystemBrowser};
use nimbus_config::{ConfigFileWriter, Context};
use prompt::InteractivePrompter;

#[tokio::main]
async fn main() {
    // Load .env BEFORE parsing so the context sees its variables.
    if let Err(e) = nimbus_config::load_dotenv() {
        eprintln!("Failed to load environment: {e}");
        std::process::exit(ExitCode::GeneralError.as_i32());
    }

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            match err.downcast_ref::<LoginError>() {
                Some(login_err) => ExitCode::from(login_err),
                None => ExitCode::GeneralError,
            }
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut ctx = Context::new();
    if let Some(profile) = &cli.profile {
        ctx.set_manual("profile", profile);
    }
    if let Some(endpoint_url) = &cli.endpoint_url {
        ctx.set_manual("endpoint_url", endpoint_url);
    }
    if let Some(api_endpoint_url) = &cli.api_endpoint_url {
        ctx.set_manual("api_endpoint_url", api_endpoint_url);
    }

    let writer = ConfigFileWriter::new();
    let stdout = std::io::stdout();

    match &cli.command {
        Command::Configure { action: None } => {
            let mut prompter = InteractivePrompter::new();
            commands::configure::run_interactive(&ctx, &mut prompter, &writer)
        }
        Command::Configure {
            action: Some(ConfigureAction::Get { name }),
        } => commands::configure::run_get(&ctx, name, &mut stdout.lock()),
        Command::Configure {
            action: Some(ConfigureAction::Set { name, value }),
        } => commands::configure::run_set(&ctx, name, value, &writer),
        Command::Configure {
            action: Some(ConfigureAction::List),
        } => commands::configure::run_list(&ctx, &mut stdout.lock()),
        Command::Login(login_args) => {
            commands::login::run(
                &ctx,
                login_args,
                &writer,
                &SystemBrowser,
                &mut stdout.lock(),
            )
            .await
        }
        Command::Logout => commands::logout::run(&ctx, &writer),
    }
}
