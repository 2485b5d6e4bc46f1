//! Device command handlers.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use skybell_core::{DeviceRecord, DeviceStatus, Skybell};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DeviceView {
    id: String,
    name: String,
    hardware: String,
    #[serde(serialize_with = "serialize_status")]
    status: DeviceStatus,
    firmware_version: String,
    mac: String,
    serial_no: String,
    wifi_ssid: String,
    wifi_link_quality: String,
    led_color: Option<String>,
    last_connected: Option<String>,
    last_activity: Option<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_status<S: serde::Serializer>(status: &DeviceStatus, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(status)
}

impl From<&Arc<DeviceRecord>> for DeviceView {
    fn from(d: &Arc<DeviceRecord>) -> Self {
        let latest = d.latest(None);
        Self {
            id: d.id().to_owned(),
            name: d.name().to_owned(),
            hardware: d.hardware().to_owned(),
            status: d.status(),
            firmware_version: d.firmware_version().to_owned(),
            mac: d.mac().to_owned(),
            serial_no: d.serial_no().to_owned(),
            wifi_ssid: d.wifi_ssid().to_owned(),
            wifi_link_quality: d.wifi_link_quality().to_owned(),
            led_color: d.led_color().map(str::to_owned),
            last_connected: d.last_connected().map(|t| t.to_rfc3339()),
            last_activity: latest.event_time.map(|t| t.to_string()),
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Hardware")]
    hardware: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
    #[tabled(rename = "WiFi")]
    wifi: String,
}

fn row(d: &DeviceView, color: bool) -> DeviceRow {
    DeviceRow {
        id: d.id.clone(),
        name: d.name.clone(),
        hardware: d.hardware.clone(),
        status: output::status(d.status, color),
        firmware: d.firmware_version.clone(),
        wifi: d.wifi_link_quality.clone(),
    }
}

fn detail(d: &DeviceView) -> String {
    [
        format!("ID:            {}", d.id),
        format!("Name:          {}", d.name),
        format!("Hardware:      {}", d.hardware),
        format!("Status:        {}", d.status),
        format!("Firmware:      {}", d.firmware_version),
        format!("MAC:           {}", or_dash(&d.mac)),
        format!("Serial:        {}", or_dash(&d.serial_no)),
        format!("WiFi SSID:     {}", or_dash(&d.wifi_ssid)),
        format!("WiFi quality:  {}", or_dash(&d.wifi_link_quality)),
        format!("LED color:     {}", d.led_color.as_deref().unwrap_or("off")),
        format!("Connected:     {}", d.last_connected.as_deref().unwrap_or("-")),
        format!("Last activity: {}", d.last_activity.as_deref().unwrap_or("-")),
    ]
    .join("\n")
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

#[derive(Serialize, Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(skybell: &Skybell, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    match args.command {
        DevicesCommand::List => {
            let devices = skybell.devices(false).await?;
            let views: Vec<DeviceView> = devices.iter().map(DeviceView::from).collect();
            let out = output::render_list(global.output, &views, |d| row(d, color), |d| d.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let record = skybell.device(&device, true).await?;
            let view = DeviceView::from(&record);
            let out = output::render_single(global.output, &view, detail, |d| d.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Settings { device } => {
            let record = skybell.device(&device, false).await?;
            let rows: Vec<SettingRow> = record
                .settings()
                .into_iter()
                .flatten()
                .map(|(key, value)| SettingRow {
                    key: key.clone(),
                    value: match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                })
                .collect();
            let out = output::render_list(
                global.output,
                &rows,
                |r| SettingRow {
                    key: r.key.clone(),
                    value: r.value.clone(),
                },
                |r| format!("{}={}", r.key, r.value),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
