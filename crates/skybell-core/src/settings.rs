// ── Device settings ──
//
// Every writable setting, its accepted domain, and the wire fragment it
// turns into. Validation runs before anything is sent.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::CoreError;
use crate::model::device::LED_COLOR;

/// Color applied when the LED is switched on without a stored color.
pub const DEFAULT_LED_COLOR: &str = "#00ff00";

const LEVELS: [i64; 4] = [0, 1, 2, 3];
const MOTION_SENSITIVITY: [i64; 3] = [32, 50, 100];
const BRIGHTNESS_MAX: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Setting {
    IndoorChime,
    DigitalChime,
    OutdoorChime,
    MotionDetection,
    DebugMotionDetect,
    DoNotDisturb,
    DoNotRing,
    OutdoorChimeVolume,
    SpeakerVolume,
    ImageQuality,
    MotionSensitivity,
    Brightness,
    LedColor,
    /// Turns the LED on (restoring its color) or off.
    NormalLed,
    Name,
}

impl Setting {
    fn is_toggle(self) -> bool {
        matches!(
            self,
            Self::IndoorChime
                | Self::DigitalChime
                | Self::OutdoorChime
                | Self::MotionDetection
                | Self::DebugMotionDetect
                | Self::DoNotDisturb
                | Self::DoNotRing
        )
    }
}

/// A caller-supplied setting value before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Rgb([i64; 3]),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Rgb([r, g, b]) => write!(f, "({r}, {g}, {b})"),
        }
    }
}

/// Parses command-line input: `r,g,b` triples, integers, `true`/`false`
/// (any case), anything else as text.
impl FromStr for SettingValue {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if let [r, g, b] = parts.as_slice() {
            if let (Ok(r), Ok(g), Ok(b)) = (r.parse(), g.parse(), b.parse()) {
                return Ok(Self::Rgb([r, g, b]));
            }
        }
        if let Ok(n) = s.parse() {
            return Ok(Self::Int(n));
        }
        if s.eq_ignore_ascii_case("true") {
            return Ok(Self::Bool(true));
        }
        if s.eq_ignore_ascii_case("false") {
            return Ok(Self::Bool(false));
        }
        Ok(Self::Text(s.to_owned()))
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// Validate `value` for `setting` and build the fragment to POST.
///
/// `current` is the device's stored `settings` object, used when
/// switching the LED back on.
pub fn settings_fragment(
    setting: Setting,
    value: &SettingValue,
    current: Option<&Map<String, Value>>,
) -> Result<Map<String, Value>, CoreError> {
    let invalid = || CoreError::InvalidSettingValue {
        key: setting.to_string(),
        value: value.to_string(),
    };

    let wire = match (setting, value) {
        (s, SettingValue::Bool(b)) if s.is_toggle() => Value::from(if *b { "True" } else { "False" }),
        (s, SettingValue::Text(t)) if s.is_toggle() && (t == "True" || t == "False") => {
            Value::from(t.as_str())
        }
        (
            Setting::OutdoorChimeVolume | Setting::SpeakerVolume | Setting::ImageQuality,
            SettingValue::Int(n),
        ) if LEVELS.contains(n) => Value::from(*n),
        (Setting::MotionSensitivity, SettingValue::Int(n)) if MOTION_SENSITIVITY.contains(n) => {
            Value::from(*n)
        }
        (Setting::Brightness, SettingValue::Int(n)) if (0..=BRIGHTNESS_MAX).contains(n) => {
            Value::from(*n)
        }
        (Setting::LedColor, SettingValue::Rgb(rgb)) => {
            Value::from(hex_color(*rgb).ok_or_else(invalid)?)
        }
        (Setting::NormalLed, SettingValue::Bool(on)) => {
            let color = if *on {
                current
                    .and_then(|s| s.get(LED_COLOR))
                    .and_then(Value::as_str)
                    .filter(|c| !c.is_empty())
                    .unwrap_or(DEFAULT_LED_COLOR)
            } else {
                ""
            };
            Value::from(color)
        }
        (Setting::Name, SettingValue::Text(name)) if !name.trim().is_empty() => {
            Value::from(name.trim())
        }
        _ => return Err(invalid()),
    };

    let key = match setting {
        Setting::LedColor | Setting::NormalLed => LED_COLOR,
        _ => setting.as_ref(),
    };

    let mut fragment = Map::new();
    fragment.insert(key.to_owned(), wire);
    Ok(fragment)
}

fn hex_color(rgb: [i64; 3]) -> Option<String> {
    let [r, g, b] = rgb.map(|c| u8::try_from(c).ok());
    Some(format!("#{:02x}{:02x}{:02x}", r?, g?, b?))
}
