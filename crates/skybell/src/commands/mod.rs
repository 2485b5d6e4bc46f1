//! Command dispatch: bridges CLI args -> `Skybell` calls -> output formatting.

pub mod activities;
pub mod devices;
pub mod session;
pub mod settings;

use skybell_config::{Config, ConfigError, Profile};
use skybell_core::{ClientConfig, Skybell};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Profile name, profile and global config resolved for one invocation.
pub struct Context {
    pub profile_name: String,
    pub profile: Profile,
    pub config: Config,
}

impl Context {
    /// Load the config file and pick the active profile.
    ///
    /// Without an explicit `--profile`, a missing default profile is an
    /// empty one so environment credentials still work.
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let config = skybell_config::load_config_or_default();
        let (profile_name, profile) = match config.profile(global.profile.as_deref()) {
            Ok((name, profile)) => (name, profile.clone()),
            Err(ConfigError::UnknownProfile { profile }) if global.profile.is_none() => {
                (profile, Profile::default())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            profile_name,
            profile,
            config,
        })
    }

    pub fn client_config(&self) -> Result<ClientConfig, CliError> {
        Ok(skybell_config::profile_to_client_config(
            &self.profile,
            &self.profile_name,
            &self.config.defaults,
        )?)
    }
}

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => session::login(ctx, args, global).await,
        Command::Logout(args) => session::logout(ctx, &args, global).await,
        Command::User => session::user(&connect(ctx).await?, global).await,
        Command::Session(args) => session::status(&connect(ctx).await?, &args, global).await,
        Command::Devices(args) => devices::handle(&connect(ctx).await?, args, global).await,
        Command::Activities(args) => activities::handle(&connect(ctx).await?, args, global).await,
        Command::Set(args) => settings::handle(&connect(ctx).await?, args, global).await,
    }
}

/// Build the client, restore the cached session and load the device list.
async fn connect(ctx: &Context) -> Result<Skybell, CliError> {
    let skybell = Skybell::new(ctx.client_config()?)?;
    let devices = skybell.initialize().await?;
    tracing::debug!(profile = %ctx.profile_name, devices = devices.len(), "connected");
    Ok(skybell)
}
