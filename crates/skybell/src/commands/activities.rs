//! Activity command handlers.

use std::path::PathBuf;

use serde::Serialize;
use tabled::Tabled;

use skybell_core::{Activity, Skybell};

use crate::cli::{ActivitiesArgs, ActivitiesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Serialize, Tabled)]
struct ActivityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Event")]
    event_type: String,
    #[tabled(rename = "Time")]
    event_time: String,
    #[tabled(rename = "Video")]
    has_video: bool,
}

impl From<&Activity> for ActivityRow {
    fn from(a: &Activity) -> Self {
        Self {
            id: a.id.clone(),
            event_type: a.event_type.clone(),
            event_time: a
                .event_time
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            has_video: a.video_url.is_some(),
        }
    }
}

fn copy_row(r: &ActivityRow) -> ActivityRow {
    ActivityRow {
        id: r.id.clone(),
        event_type: r.event_type.clone(),
        event_time: r.event_time.clone(),
        has_video: r.has_video,
    }
}

fn detail(r: &ActivityRow) -> String {
    if r.id.is_empty() {
        return format!("No activity recorded (since {})", r.event_time);
    }
    [
        format!("ID:     {}", r.id),
        format!("Event:  {}", r.event_type),
        format!("Time:   {}", r.event_time),
        format!("Video:  {}", if r.has_video { "yes" } else { "no" }),
    ]
    .join("\n")
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

pub async fn handle(
    skybell: &Skybell,
    args: ActivitiesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ActivitiesCommand::List {
            device,
            limit,
            event_type,
        } => {
            let record = skybell.device(&device, true).await?;
            let rows: Vec<ActivityRow> = record
                .activities(limit, event_type.as_deref())
                .into_iter()
                .map(ActivityRow::from)
                .collect();
            let out = output::render_list(global.output, &rows, copy_row, |r| r.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ActivitiesCommand::Latest { device, event_type } => {
            let record = skybell.device(&device, true).await?;
            let row = ActivityRow::from(&record.latest(event_type.as_deref()));
            let out = output::render_single(global.output, &row, detail, |r| r.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ActivitiesCommand::Video {
            device,
            activity,
            url_only,
            file,
        } => {
            if activity.is_none() {
                // The newest activity is only known after a refresh.
                skybell.device(&device, true).await?;
            }
            if url_only {
                let url = skybell
                    .activity_video_url(&device, activity.as_deref())
                    .await?;
                output::print_output(&url, global.quiet);
                return Ok(());
            }

            let bytes = skybell.download_video(&device, activity.as_deref()).await?;
            let path = file.unwrap_or_else(|| {
                let stem = activity.unwrap_or_else(|| format!("{device}-latest"));
                PathBuf::from(format!("{stem}.mp4"))
            });
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|source| CliError::Write {
                    path: path.clone(),
                    source,
                })?;
            if !global.quiet {
                eprintln!("Saved {} bytes to {}", bytes.len(), path.display());
            }
            Ok(())
        }

        ActivitiesCommand::Delete { activity } => {
            if !confirm(&format!("Delete activity {activity}?"), global.yes)? {
                return Ok(());
            }
            skybell.delete_activity(&activity).await?;
            if !global.quiet {
                eprintln!("Deleted activity {activity}");
            }
            Ok(())
        }
    }
}
