//! Login, logout and session inspection.

use secrecy::SecretString;
use serde::Serialize;

use skybell_core::Skybell;

use super::Context;
use crate::cli::{GlobalOpts, LoginArgs, LogoutArgs, SessionArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct UserView {
    id: String,
    first_name: String,
    last_name: String,
}

impl UserView {
    fn of(skybell: &Skybell) -> Self {
        Self {
            id: skybell.user_id().unwrap_or_default(),
            first_name: skybell.user_first_name().unwrap_or_default(),
            last_name: skybell.user_last_name().unwrap_or_default(),
        }
    }
}

fn user_detail(u: &UserView) -> String {
    [
        format!("ID:    {}", u.id),
        format!("Name:  {} {}", u.first_name, u.last_name),
    ]
    .join("\n")
}

#[derive(Serialize)]
struct SessionView {
    refresh_period_secs: i64,
    refresh_at: Option<String>,
}

/// Map an interactive prompt failure into a CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub async fn login(ctx: &Context, args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let username = match args
        .username
        .or_else(|| ctx.profile.username.clone())
        .or_else(|| std::env::var(skybell_config::USERNAME_ENV).ok())
    {
        Some(username) => username,
        None => dialoguer::Input::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(prompt_err)?,
    };
    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if username.trim().is_empty() || password.is_empty() {
        return Err(CliError::Validation {
            field: "credentials".into(),
            reason: "username and password cannot be empty".into(),
        });
    }
    let password = SecretString::from(password);

    let mut profile = ctx.profile.clone();
    profile.username = Some(username.clone());
    let client_config =
        skybell_config::profile_to_client_config(&profile, &ctx.profile_name, &ctx.config.defaults)?;

    let skybell = Skybell::new(client_config)?;
    skybell.load_cache().await?;
    if !skybell.login(Some(&username), Some(password.clone())).await? {
        return Err(CliError::ApiError {
            message: "the login request did not complete".into(),
            status: None,
        });
    }
    skybell.user().await?;

    if args.save_password {
        skybell_config::store_password(&ctx.profile_name, &password)?;
    }
    let mut config = skybell_config::load_config_or_default();
    config.profiles.insert(ctx.profile_name.clone(), profile);
    skybell_config::save_config(&config)?;
    tracing::info!(profile = %ctx.profile_name, "profile saved");

    let user = UserView::of(&skybell);
    let out = output::render_single(global.output, &user, user_detail, |u| u.id.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn logout(ctx: &Context, args: &LogoutArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let skybell = Skybell::new(ctx.client_config()?)?;
    skybell.logout().await;
    skybell.erase_cache().await?;

    if args.forget {
        skybell_config::forget_password(&ctx.profile_name)?;
    }
    if !global.quiet {
        eprintln!("Logged out of profile '{}'", ctx.profile_name);
    }
    Ok(())
}

pub async fn user(skybell: &Skybell, global: &GlobalOpts) -> Result<(), CliError> {
    skybell.user().await?;
    let user = UserView::of(skybell);
    let out = output::render_single(global.output, &user, user_detail, |u| u.id.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn status(skybell: &Skybell, args: &SessionArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.refresh && !skybell.refresh_session().await? {
        return Err(CliError::ApiError {
            message: "the token refresh did not complete".into(),
            status: None,
        });
    }

    let view = SessionView {
        refresh_period_secs: skybell.session_refresh_period().await,
        refresh_at: skybell
            .session_refresh_timestamp()
            .await
            .map(|at| at.to_rfc3339()),
    };
    let out = output::render_single(
        global.output,
        &view,
        |s| {
            format!(
                "Refresh period:  {}s\nRefresh at:      {}",
                s.refresh_period_secs,
                s.refresh_at.as_deref().unwrap_or("-")
            )
        },
        |s| s.refresh_period_secs.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
