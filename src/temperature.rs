/*
 *  temperature.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Temperature units, absolute conversion and display labels
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

use std::fmt;
use std::str::FromStr;

const ABSOLUTE_ZERO_C: f64 = -273.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TempUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl FromStr for TempUnit {
    type Err = String;

    /// Accepts "C", "°c", " f ", "kelvin" and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.replace('°', "").trim().to_ascii_uppercase();
        match norm.as_str() {
            "C" | "CELSIUS" => Ok(TempUnit::Celsius),
            "F" | "FAHRENHEIT" => Ok(TempUnit::Fahrenheit),
            "K" | "KELVIN" => Ok(TempUnit::Kelvin),
            _ => Err(format!("unknown temperature unit '{}'", s)),
        }
    }
}

impl TempUnit {
    pub fn label(&self) -> &'static str {
        match self {
            TempUnit::Celsius => "°C",
            TempUnit::Fahrenheit => "°F",
            TempUnit::Kelvin => "K",
        }
    }

    fn to_celsius(self, v: f64) -> f64 {
        match self {
            TempUnit::Celsius => v,
            TempUnit::Fahrenheit => (v - 32.0) * 5.0 / 9.0,
            TempUnit::Kelvin => v + ABSOLUTE_ZERO_C,
        }
    }

    fn from_celsius(self, c: f64) -> f64 {
        match self {
            TempUnit::Celsius => c,
            TempUnit::Fahrenheit => c * 9.0 / 5.0 + 32.0,
            TempUnit::Kelvin => c - ABSOLUTE_ZERO_C,
        }
    }
}

impl fmt::Display for TempUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convert through Celsius; readings below absolute zero are rejected.
pub fn convert(value: f64, from: TempUnit, to: TempUnit) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let c = from.to_celsius(value);
    if c < ABSOLUTE_ZERO_C - 1e-9 {
        return None;
    }
    if from == to {
        return Some(value);
    }
    Some(to.from_celsius(c))
}

/// Rounded value plus unit label, ready for a card
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureLabel {
    pub value: Option<i64>,
    pub unit: TempUnit,
}

impl TemperatureLabel {
    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

impl fmt::Display for TemperatureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{}{}", v, self.unit),
            None => write!(f, "--{}", self.unit),
        }
    }
}

/// `source_unit` is whatever the feed reported ("C" when absent); an
/// unknown unit or unusable reading gives the `--` sentinel.
pub fn format_temperature(
    reading: Option<f64>,
    source_unit: Option<&str>,
    target: TempUnit,
) -> TemperatureLabel {
    let from = match source_unit.map(str::trim).filter(|u| !u.is_empty()) {
        Some(u) => u.parse::<TempUnit>().ok(),
        None => Some(TempUnit::Celsius),
    };
    let value = reading
        .zip(from)
        .and_then(|(r, from)| convert(r, from, target))
        .map(|v| v.round() as i64);
    TemperatureLabel { value, unit: target }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_points() {
        assert_eq!(convert(0.0, TempUnit::Celsius, TempUnit::Fahrenheit), Some(32.0));
        assert_eq!(convert(100.0, TempUnit::Celsius, TempUnit::Fahrenheit), Some(212.0));
        let k = convert(0.0, TempUnit::Celsius, TempUnit::Kelvin).unwrap();
        assert!((k - 273.15).abs() < 1e-9);
        let back = convert(212.0, TempUnit::Fahrenheit, TempUnit::Celsius).unwrap();
        assert!((back - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_below_absolute_zero_rejected() {
        assert_eq!(convert(-300.0, TempUnit::Celsius, TempUnit::Kelvin), None);
        assert_eq!(convert(-1.0, TempUnit::Kelvin, TempUnit::Celsius), None);
        assert_eq!(convert(f64::NAN, TempUnit::Celsius, TempUnit::Celsius), None);
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("°f".parse::<TempUnit>(), Ok(TempUnit::Fahrenheit));
        assert_eq!(" K ".parse::<TempUnit>(), Ok(TempUnit::Kelvin));
        assert!("R".parse::<TempUnit>().is_err());
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(format_temperature(Some(21.6), None, TempUnit::Celsius).to_string(), "22°C");
        assert_eq!(
            format_temperature(Some(0.0), Some("C"), TempUnit::Fahrenheit).to_string(),
            "32°F"
        );
        assert_eq!(format_temperature(Some(0.0), Some("°C"), TempUnit::Kelvin).to_string(), "273K");
        assert_eq!(format_temperature(None, Some("C"), TempUnit::Celsius).to_string(), "--°C");
        assert_eq!(
            format_temperature(Some(20.0), Some("Rankine"), TempUnit::Celsius).to_string(),
            "--°C"
        );
    }
}
