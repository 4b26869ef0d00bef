/*
 *  timefmt.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display timezone resolution and Spanish date labels
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

use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use log::debug;

const WEEKDAYS: [&str; 7] = ["lunes", "martes", "miércoles", "jueves", "viernes", "sábado", "domingo"];
const WEEKDAYS_SHORT: [&str; 7] = ["lun.", "mar.", "mié.", "jue.", "vie.", "sáb.", "dom."];
const MONTHS: [&str; 12] = [
    "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto", "septiembre",
    "octubre", "noviembre", "diciembre",
];
const MONTHS_SHORT: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

/// Zone the kiosk displays times in.
///
/// UTC, explicit offsets and IANA names are exact; a name the zone
/// database does not know is taken to be the host's own zone.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisplayZone {
    #[default]
    Utc,
    Fixed(FixedOffset),
    Named(Tz),
    HostLocal(String),
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (h, m) = if digits.len() <= 2 {
        (digits.parse::<i32>().ok()?, 0)
    } else {
        let split = digits.len() - 2;
        (digits[..split].parse::<i32>().ok()?, digits[split..].parse::<i32>().ok()?)
    };
    if h > 14 || m > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
}

impl DisplayZone {
    pub fn resolve(name: &str) -> Self {
        let trimmed = name.trim();
        let upper = trimmed.to_ascii_uppercase();
        if matches!(upper.as_str(), "UTC" | "Z" | "GMT" | "ETC/UTC") {
            return DisplayZone::Utc;
        }
        let offset_part = upper
            .strip_prefix("UTC")
            .or_else(|| upper.strip_prefix("GMT"))
            .unwrap_or(&upper);
        if let Some(off) = parse_offset(offset_part) {
            return DisplayZone::Fixed(off);
        }
        if let Ok(tz) = trimmed.parse::<Tz>() {
            return DisplayZone::Named(tz);
        }
        debug!("timezone '{}' resolved to the host zone", trimmed);
        DisplayZone::HostLocal(trimmed.to_string())
    }

    pub fn offset_at(&self, at: DateTime<Utc>) -> FixedOffset {
        match self {
            DisplayZone::Utc => Utc.fix(),
            DisplayZone::Fixed(off) => *off,
            DisplayZone::Named(tz) => tz.offset_from_utc_datetime(&at.naive_utc()).fix(),
            DisplayZone::HostLocal(_) => Local.offset_from_utc_datetime(&at.naive_utc()).fix(),
        }
    }

    pub fn localize(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset_at(at))
    }

    /// A wall clock reading in this zone; the earlier instant wins when
    /// the reading is ambiguous.
    pub fn at_local(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            DisplayZone::Named(tz) => {
                tz.from_local_datetime(&naive).earliest().map(|dt| dt.fixed_offset())
            }
            DisplayZone::HostLocal(_) => {
                Local.from_local_datetime(&naive).earliest().map(|dt| dt.fixed_offset())
            }
            _ => self.offset_at(naive.and_utc()).from_local_datetime(&naive).single(),
        }
    }
}

/// `HH:mm:ss`
pub fn clock_label(at: &DateTime<FixedOffset>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// `lunes, 6 de enero de 2025`
pub fn long_date_label(at: &DateTime<FixedOffset>) -> String {
    let wd = WEEKDAYS[at.weekday().num_days_from_monday() as usize];
    let month = MONTHS[at.month0() as usize];
    format!("{}, {} de {} de {}", wd, at.day(), month, at.year())
}

/// `lun. 6 ene, 10:00`
pub fn short_event_label(at: &DateTime<FixedOffset>) -> String {
    let wd = WEEKDAYS_SHORT[at.weekday().num_days_from_monday() as usize];
    let month = MONTHS_SHORT[at.month0() as usize];
    format!("{} {} {}, {}", wd, at.day(), month, at.format("%H:%M"))
}

/// Event start from a feed: RFC 3339 is converted into `zone`, naive
/// stamps are taken as already local to it.
pub fn parse_event_start(raw: &str, zone: &DisplayZone) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(zone.localize(dt.with_timezone(&Utc)));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    zone.at_local(naive)
}
