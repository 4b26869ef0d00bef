/*
 *  appconfig.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Remote kiosk configuration served by the backend, every field defaulted
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::temperature::TempUnit;
use crate::timefmt::DisplayZone;

/// An explicit `null` section reads like a missing one.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayModule {
    pub name: String,
    pub enabled: bool,
    pub duration_seconds: u32,
}

impl Default for DisplayModule {
    fn default() -> Self {
        Self { name: String::new(), enabled: true, duration_seconds: 20 }
    }
}

fn default_modules() -> Vec<DisplayModule> {
    ["clock", "weather", "moon", "news", "events", "calendar"]
        .iter()
        .map(|n| DisplayModule { name: n.to_string(), ..Default::default() })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub timezone: String,
    pub rotation: String,
    pub module_cycle_seconds: u32,
    pub modules: Vec<DisplayModule>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            timezone: "Europe/Madrid".into(),
            rotation: "left".into(),
            module_cycle_seconds: 20,
            modules: default_modules(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub weather: Option<String>,
    pub news: Option<String>,
    pub astronomy: Option<String>,
    pub calendar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".into(),
            port: 1883,
            topic: "pantalla/reloj".into(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiSettings {
    pub interface: String,
    pub ssid: Option<String>,
    pub psk: Option<String>,
}

impl Default for WifiSettings {
    fn default() -> Self {
        Self { interface: "wlan2".into(), ssid: None, psk: None }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StormMode {
    pub enabled: bool,
    pub last_triggered: Option<String>,
}

/// Scroll speed: a named preset or pixels per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollSpeed {
    Slow,
    Normal,
    Fast,
    Pixels(f64),
}

impl ScrollSpeed {
    /// Anything unrecognised is `Normal`.
    pub fn from_value(v: &Value) -> Self {
        match v {
            Value::String(s) => match s.trim() {
                "slow" => ScrollSpeed::Slow,
                "normal" => ScrollSpeed::Normal,
                "fast" => ScrollSpeed::Fast,
                other => other
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite() && *n > 0.0)
                    .map(ScrollSpeed::Pixels)
                    .unwrap_or(ScrollSpeed::Normal),
            },
            Value::Number(n) => n
                .as_f64()
                .filter(|n| n.is_finite() && *n > 0.0)
                .map(ScrollSpeed::Pixels)
                .unwrap_or(ScrollSpeed::Normal),
            _ => ScrollSpeed::Normal,
        }
    }

    pub fn pixels_per_second(&self) -> f64 {
        match self {
            ScrollSpeed::Slow => 45.0,
            ScrollSpeed::Normal => 80.0,
            ScrollSpeed::Fast => 120.0,
            ScrollSpeed::Pixels(px) => *px,
        }
    }
}

impl Serialize for ScrollSpeed {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            ScrollSpeed::Slow => s.serialize_str("slow"),
            ScrollSpeed::Normal => s.serialize_str("normal"),
            ScrollSpeed::Fast => s.serialize_str("fast"),
            ScrollSpeed::Pixels(px) => s.serialize_f64(*px),
        }
    }
}

impl<'de> Deserialize<'de> for ScrollSpeed {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(d)?;
        Ok(ScrollSpeed::from_value(&v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Left,
    Up,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollSettings {
    pub enabled: bool,
    pub direction: ScrollDirection,
    pub speed: ScrollSpeed,
    pub gap_px: f64,
}

impl ScrollSettings {
    /// Defaults for a panel key; unknown panels scroll left at normal speed.
    pub fn default_for(key: &str) -> Self {
        let (direction, speed, gap_px) = match key {
            "news" => (ScrollDirection::Left, ScrollSpeed::Normal, 48.0),
            "ephemerides" | "forecast" => (ScrollDirection::Up, ScrollSpeed::Slow, 24.0),
            _ => (ScrollDirection::Left, ScrollSpeed::Normal, 48.0),
        };
        Self { enabled: true, direction, speed, gap_px }
    }

    /// Overlay whatever keys `raw` carries on the defaults for `key`.
    pub fn merged(key: &str, raw: &Value) -> Self {
        let mut s = Self::default_for(key);
        let Some(obj) = raw.as_object() else {
            return s;
        };
        if let Some(b) = obj.get("enabled").and_then(Value::as_bool) {
            s.enabled = b;
        }
        match obj.get("direction").and_then(Value::as_str) {
            Some("left") => s.direction = ScrollDirection::Left,
            Some("up") => s.direction = ScrollDirection::Up,
            _ => {}
        }
        // a present but bogus speed becomes normal, an absent one keeps the default
        if let Some(v) = obj.get("speed") {
            s.speed = ScrollSpeed::from_value(v);
        }
        if let Some(v) = obj.get("gap_px") {
            let gap = v
                .as_f64()
                .or_else(|| v.as_str().and_then(|t| t.trim().parse::<f64>().ok()));
            if let Some(g) = gap.filter(|g| g.is_finite() && *g >= 0.0) {
                s.gap_px = g;
            }
        }
        s
    }
}

fn default_scroll() -> BTreeMap<String, ScrollSettings> {
    ["news", "ephemerides", "forecast"]
        .iter()
        .map(|k| (k.to_string(), ScrollSettings::default_for(k)))
        .collect()
}

fn deserialize_scroll<'de, D>(deserializer: D) -> Result<BTreeMap<String, ScrollSettings>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    let mut out = default_scroll();
    if let Value::Object(map) = v {
        for (key, raw) in map {
            let merged = ScrollSettings::merged(&key, &raw);
            out.insert(key, merged);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    #[serde(deserialize_with = "deserialize_scroll")]
    pub scroll: BTreeMap<String, ScrollSettings>,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self { scroll: default_scroll() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockFormat {
    pub format: String,
}

impl Default for ClockFormat {
    fn default() -> Self {
        Self { format: "HH:mm".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureSettings {
    pub unit: String,
}

impl Default for TemperatureSettings {
    fn default() -> Self {
        Self { unit: "C".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedSettings {
    #[serde(deserialize_with = "null_default")]
    pub clock: ClockFormat,
    #[serde(deserialize_with = "null_default")]
    pub temperature: TemperatureSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    pub enabled: bool,
    pub duration_sec: u32,
    pub panels: Vec<String>,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_sec: 10,
            panels: ["news", "ephemerides", "moon", "forecast", "calendar"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub provider: String,
    pub center: [f64; 2],
    pub zoom: f64,
    pub interactive: bool,
    pub controls: bool,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            provider: "osm".into(),
            center: [0.0, 20.0],
            zoom: 1.6,
            interactive: false,
            controls: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Full,
    Widgets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidePanel {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    #[serde(deserialize_with = "null_default")]
    pub rotation: RotationSettings,
    #[serde(deserialize_with = "null_default")]
    pub fixed: FixedSettings,
    #[serde(deserialize_with = "null_default")]
    pub map: MapSettings,
    #[serde(deserialize_with = "null_default")]
    pub text: TextSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_panel: Option<SidePanel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_config: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_demo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carousel: Option<bool>,
}

/// Configuration document of `GET /config`; absent fields take defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(deserialize_with = "null_default")]
    pub display: DisplaySettings,
    #[serde(deserialize_with = "null_default")]
    pub api_keys: ApiKeys,
    #[serde(deserialize_with = "null_default")]
    pub mqtt: MqttSettings,
    #[serde(deserialize_with = "null_default")]
    pub wifi: WifiSettings,
    #[serde(deserialize_with = "null_default")]
    pub storm_mode: StormMode,
    #[serde(deserialize_with = "null_default")]
    pub ui: UiSettings,
}

impl AppConfig {
    /// Parse a payload; a `null` body is the default configuration.
    pub fn from_value(v: Value) -> Result<Self, serde_json::Error> {
        if v.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(v)
    }

    /// Display unit, Celsius when the configured text is not a unit
    pub fn temperature_unit(&self) -> TempUnit {
        self.ui.fixed.temperature.unit.parse().unwrap_or_default()
    }

    pub fn display_zone(&self) -> DisplayZone {
        DisplayZone::resolve(&self.display.timezone)
    }

    pub fn scroll_for(&self, panel: &str) -> ScrollSettings {
        self.ui
            .text
            .scroll
            .get(panel)
            .cloned()
            .unwrap_or_else(|| ScrollSettings::default_for(panel))
    }
}
