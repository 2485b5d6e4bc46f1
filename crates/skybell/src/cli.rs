//! Clap derive structures for the `skybell` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use skybell_core::{Setting, SettingValue};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// skybell -- inspect and configure SkyBell doorbells
#[derive(Debug, Parser)]
#[command(
    name = "skybell",
    version,
    about = "Inspect and configure SkyBell doorbells from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "SKYBELL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SKYBELL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    JsonCompact,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and save the account to a profile
    Login(LoginArgs),

    /// End the session and remove the cached tokens
    Logout(LogoutArgs),

    /// Show the signed-in user
    User,

    /// Show when the session will be refreshed
    Session(SessionArgs),

    /// List and inspect devices
    #[command(alias = "d")]
    Devices(DevicesArgs),

    /// Browse device activity and download videos
    #[command(alias = "a")]
    Activities(ActivitiesArgs),

    /// Change a device setting
    Set(SetArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account e-mail (prompted when missing)
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Keep the password in the system keyring
    #[arg(long)]
    pub save_password: bool,
}

#[derive(Debug, Args)]
pub struct LogoutArgs {
    /// Also remove the password from the system keyring
    #[arg(long)]
    pub forget: bool,
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Refresh the tokens now
    #[arg(long)]
    pub refresh: bool,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices on the account
    #[command(alias = "ls")]
    List,

    /// Show one device, refreshed from the cloud
    Get {
        /// Device id
        device: String,
    },

    /// Show a device's current settings
    Settings {
        /// Device id
        device: String,
    },
}

// ── Activities ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ActivitiesArgs {
    #[command(subcommand)]
    pub command: ActivitiesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ActivitiesCommand {
    /// List recent activities, newest first
    #[command(alias = "ls")]
    List {
        /// Device id
        device: String,

        /// Maximum number of activities to show
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,

        /// Only show this event type (e.g. `device:sensor:motion`)
        #[arg(long = "type", short = 't')]
        event_type: Option<String>,
    },

    /// Show the newest activity, optionally of one event type
    Latest {
        /// Device id
        device: String,

        /// Event type, or a short name such as `motion` or `button`
        #[arg(long = "type", short = 't')]
        event_type: Option<String>,
    },

    /// Download an activity video
    Video {
        /// Device id
        device: String,

        /// Activity id (defaults to the newest activity)
        #[arg(long, short = 'a')]
        activity: Option<String>,

        /// Print the signed URL instead of downloading
        #[arg(long)]
        url_only: bool,

        /// Destination file (defaults to `<activity>.mp4`)
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },

    /// Delete an activity
    Delete {
        /// Activity id
        activity: String,
    },
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device id
    pub device: String,

    /// Setting name (e.g. `do_not_ring`, `brightness`, `led_color`)
    pub setting: Setting,

    /// New value: `true`/`false`, an integer, `r,g,b`, or text
    pub value: SettingValue,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn set_parses_setting_and_value() {
        let cli = Cli::try_parse_from(["skybell", "set", "dev1", "led_color", "255,0,0"]).unwrap();
        let Command::Set(args) = cli.command else {
            panic!("expected set");
        };
        assert_eq!(args.setting, Setting::LedColor);
        assert_eq!(args.value, SettingValue::Rgb([255, 0, 0]));
    }

    #[test]
    fn unknown_setting_is_rejected() {
        assert!(Cli::try_parse_from(["skybell", "set", "dev1", "volume", "1"]).is_err());
    }
}
