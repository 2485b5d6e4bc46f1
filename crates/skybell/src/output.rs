//! Output formatting: table, JSON, plain.
//!
//! Table uses `tabled`, structured formats use serde, plain emits one
//! identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use skybell_core::DeviceStatus;

use crate::cli::{ColorMode, OutputFormat};

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Status label, green or red when color is on.
pub fn status(status: DeviceStatus, color: bool) -> String {
    match (status, color) {
        (DeviceStatus::Up, true) => status.to_string().green().to_string(),
        (DeviceStatus::Down, true) => status.to_string().red().to_string(),
        (_, false) => status.to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Plain => data.iter().map(id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Single items render through `detail_fn` in table mode.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, Tabled)]
    struct Row {
        id: String,
    }

    #[test]
    fn plain_lists_one_id_per_line() {
        let rows = vec![Row { id: "a".into() }, Row { id: "b".into() }];
        let out = render_list(
            OutputFormat::Plain,
            &rows,
            |r| Row { id: r.id.clone() },
            |r| r.id.clone(),
        );
        assert_eq!(out, "a\nb");
    }

    #[test]
    fn compact_json_is_single_line() {
        let rows = vec![Row { id: "a".into() }];
        let out = render_list(
            OutputFormat::JsonCompact,
            &rows,
            |r| Row { id: r.id.clone() },
            |r| r.id.clone(),
        );
        assert_eq!(out, r#"[{"id":"a"}]"#);
    }

    #[test]
    fn status_is_plain_without_color() {
        assert_eq!(status(DeviceStatus::Up, false), "Up");
    }
}
