/*
 *  cards.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Rotating dashboard cards and their text rendering
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

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::temperature::TemperatureLabel;
use crate::timefmt::{
    DisplayZone, clock_label, long_date_label, parse_event_start, short_event_label,
};

pub const PLACEHOLDER_ID: &str = "placeholder";
pub const PLACEHOLDER_DURATION: Duration = Duration::from_millis(6000);
pub const MAX_CALENDAR_EVENTS: usize = 6;

const NO_DATA: &str = "Sin datos";
const NO_TIME: &str = "--:--";

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherView {
    pub temperature: TemperatureLabel,
    pub feels_like: Option<TemperatureLabel>,
    pub condition: Option<String>,
    pub humidity: Option<f64>,
    pub wind: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    pub start: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestItem {
    pub name: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub summary: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EphemeridesView {
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub moon_phase: Option<String>,
    pub events: Vec<String>,
}

/// What a card shows; every field is already sanitized.
#[derive(Debug, Clone, PartialEq)]
pub enum CardBody {
    Time { zone: DisplayZone },
    Weather(WeatherView),
    Calendar { events: Vec<CalendarEvent>, zone: DisplayZone },
    Moon { phase: Option<String>, illumination: Option<f64> },
    Harvest(Vec<HarvestItem>),
    Saints(Vec<String>),
    News(Vec<NewsItem>),
    Ephemerides(EphemeridesView),
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: String,
    pub duration: Duration,
    pub body: CardBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCard {
    pub title: Option<String>,
    pub lines: Vec<String>,
}

fn metric(value: Option<f64>, suffix: &str) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{}{}", v.round() as i64, suffix),
        None => "--".to_string(),
    }
}

fn titled(title: &str, lines: Vec<String>) -> RenderedCard {
    RenderedCard { title: Some(title.to_string()), lines }
}

fn or_empty(items: Vec<String>, empty: &str) -> Vec<String> {
    if items.is_empty() { vec![empty.to_string()] } else { items }
}

impl Card {
    pub fn new(id: impl Into<String>, duration_ms: u64, body: CardBody) -> Self {
        Self { id: id.into(), duration: Duration::from_millis(duration_ms), body }
    }

    /// Stand-in shown while there is nothing to rotate
    pub fn placeholder() -> Self {
        Self {
            id: PLACEHOLDER_ID.to_string(),
            duration: PLACEHOLDER_DURATION,
            body: CardBody::Placeholder,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.body, CardBody::Placeholder)
    }

    /// Pure: the same card and instant always give the same text.
    pub fn render(&self, now: DateTime<Utc>) -> RenderedCard {
        match &self.body {
            CardBody::Time { zone } => {
                let local = zone.localize(now);
                RenderedCard {
                    title: None,
                    lines: vec![clock_label(&local), long_date_label(&local)],
                }
            }
            CardBody::Weather(w) => {
                let feels = match &w.feels_like {
                    Some(f) if !f.is_missing() => format!("Sensación {}", f),
                    _ => format!("Unidad {}", w.temperature.unit),
                };
                RenderedCard {
                    title: None,
                    lines: vec![
                        w.temperature.to_string(),
                        feels,
                        w.condition.clone().unwrap_or_else(|| "Sin datos meteorológicos".into()),
                        format!("Humedad {}", metric(w.humidity, "%")),
                        format!("Viento {}", metric(w.wind, " km/h")),
                    ],
                }
            }
            CardBody::Calendar { events, zone } => {
                let lines = events
                    .iter()
                    .take(MAX_CALENDAR_EVENTS)
                    .map(|e| {
                        let when = e.start.as_deref().map(|raw| {
                            parse_event_start(raw, zone)
                                .map(|dt| short_event_label(&dt))
                                .unwrap_or_else(|| raw.to_string())
                        });
                        match when {
                            Some(when) => format!("{} · {}", e.title, when),
                            None => e.title.clone(),
                        }
                    })
                    .collect();
                titled("Agenda", or_empty(lines, "No hay eventos próximos"))
            }
            CardBody::Moon { phase, illumination } => RenderedCard {
                title: None,
                lines: vec![
                    phase.clone().unwrap_or_else(|| NO_DATA.into()),
                    format!("Iluminación {}", metric(*illumination, "%")),
                ],
            },
            CardBody::Harvest(items) => {
                let lines = items
                    .iter()
                    .map(|i| match &i.status {
                        Some(s) => format!("{} · {}", i.name, s),
                        None => i.name.clone(),
                    })
                    .collect();
                titled("Cosechas", or_empty(lines, "Sin datos de cultivo"))
            }
            CardBody::Saints(names) => {
                titled("Santoral", or_empty(names.clone(), "Sin onomásticas registradas"))
            }
            CardBody::News(items) => {
                let mut lines = Vec::new();
                for item in items {
                    lines.push(item.title.clone());
                    lines.extend(item.summary.clone());
                    lines.extend(item.source.as_ref().map(|s| format!("({})", s)));
                }
                titled("Noticias del día", or_empty(lines, "Sin titulares disponibles"))
            }
            CardBody::Ephemerides(e) => {
                let mut lines = vec![
                    format!("Amanecer {}", e.sunrise.as_deref().unwrap_or(NO_TIME)),
                    format!("Atardecer {}", e.sunset.as_deref().unwrap_or(NO_TIME)),
                    format!("Fase lunar {}", e.moon_phase.as_deref().unwrap_or(NO_DATA)),
                ];
                lines.extend(or_empty(e.events.clone(), "Sin efemérides registradas"));
                titled("Efemérides", lines)
            }
            CardBody::Placeholder => titled(
                "Datos no disponibles",
                vec!["No hay módulos activos en este momento.".to_string()],
            ),
        }
    }
}
