//! `skybell set`: validate and submit one device setting.

use skybell_core::Skybell;

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;

pub async fn handle(skybell: &Skybell, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let SetArgs {
        device,
        setting,
        value,
    } = args;

    if !skybell.set_setting(&device, setting, value.clone()).await? {
        return Err(CliError::SettingRejected {
            device,
            setting: setting.to_string(),
        });
    }
    if !global.quiet {
        eprintln!("{setting} set to {value} on {device}");
    }
    Ok(())
}
