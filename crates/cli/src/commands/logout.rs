//! The `logout` command: blank the stored credential pair for the
//! active profile.

use nimbus_config::constants::SECTION_OVERRIDE_KEY;
use nimbus_config::writer::{ConfigWriter, UpdateValues};
use nimbus_config::{
    ACCESS_KEY_ID_KEY_NAME, Context, DEFAULT_PROFILE_NAME, PRIVATE_KEY_KEY_NAME,
};

use crate::error::ExitCode;

pub fn run(ctx: &Context, writer: &dyn ConfigWriter) -> anyhow::Result<ExitCode> {
    let profile = ctx.effective_profile();
    let mut values = UpdateValues::new();
    values.insert(ACCESS_KEY_ID_KEY_NAME.to_string(), String::new());
    values.insert(PRIVATE_KEY_KEY_NAME.to_string(), String::new());
    if profile != DEFAULT_PROFILE_NAME {
        values.insert(SECTION_OVERRIDE_KEY.to_string(), profile.clone());
    }
    writer.update_config(&values, &ctx.credentials_file_path()?, None)?;
    eprintln!("Cleared credentials for profile '{profile}'.");
    Ok(ExitCode::Success)
}
