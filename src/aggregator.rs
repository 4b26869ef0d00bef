/*
 *  aggregator.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Dashboard feed aggregation, normalization and card composition
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
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::{ApiError, Feed, FeedSource};
use crate::appconfig::AppConfig;
use crate::cards::{
    CalendarEvent, Card, CardBody, EphemeridesView, HarvestItem, NewsItem, WeatherView,
};
use crate::sanitize::{ensure_plain_text, rich_field};
use crate::temperature::{TempUnit, format_temperature};
use crate::timefmt::{DisplayZone, clock_label};

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

type Doc = Map<String, Value>;

/// One refresh worth of feed documents; a failed feed is an empty object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardPayload {
    pub weather: Doc,
    pub news: Doc,
    pub astronomy: Doc,
    pub calendar: Doc,
}

/// Display preferences taken from the remote configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisplayPrefs {
    pub zone: DisplayZone,
    pub unit: TempUnit,
}

impl DisplayPrefs {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { zone: config.display_zone(), unit: config.temperature_unit() }
    }
}

fn as_doc(feed: Feed, result: Result<Value, ApiError>) -> Option<Doc> {
    match result {
        Ok(Value::Object(doc)) => Some(doc),
        Ok(other) => {
            warn!("{} feed is not an object ({}), ignored", feed, type_name(&other));
            None
        }
        Err(e) => {
            warn!("{} feed failed: {}", feed, e);
            None
        }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Fetch all four feeds concurrently. Returns the payload and how many
/// feeds answered with a usable document.
pub async fn fetch_payload<S: FeedSource + ?Sized>(source: &S) -> (DashboardPayload, usize) {
    let (weather, news, astronomy, calendar) = tokio::join!(
        source.fetch(Feed::Weather),
        source.fetch(Feed::News),
        source.fetch(Feed::Astronomy),
        source.fetch(Feed::Calendar),
    );
    let docs = [
        as_doc(Feed::Weather, weather),
        as_doc(Feed::News, news),
        as_doc(Feed::Astronomy, astronomy),
        as_doc(Feed::Calendar, calendar),
    ];
    let ok = docs.iter().filter(|d| d.is_some()).count();
    let [weather, news, astronomy, calendar] = docs.map(Option::unwrap_or_default);
    (DashboardPayload { weather, news, astronomy, calendar }, ok)
}

fn number(doc: &Doc, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| doc.get(*k).and_then(Value::as_f64))
}

fn rich(doc: &Doc, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| rich_field(doc.get(*k)))
}

fn plain(doc: &Doc, keys: &[&str]) -> Option<String> {
    keys.iter()
        .map(|k| ensure_plain_text(doc.get(*k).unwrap_or(&Value::Null)))
        .find(|s| !s.is_empty())
}

/// Entries of an array field; non-object entries read as empty objects.
fn entries(doc: &Doc, key: &str) -> Vec<Doc> {
    match doc.get(key) {
        Some(Value::Array(items)) => {
            items.iter().map(|i| i.as_object().cloned().unwrap_or_default()).collect()
        }
        _ => Vec::new(),
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|i| rich_field(Some(i))).collect(),
        Some(v @ Value::String(_)) => rich_field(Some(v)).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn weather_view(weather: &Doc, target: TempUnit) -> WeatherView {
    let unit = plain(weather, &["unit"]).unwrap_or_else(|| "C".to_string());
    let reading = number(weather, &["temperature"]);
    WeatherView {
        temperature: format_temperature(reading, Some(&unit), target),
        feels_like: number(weather, &["feels_like"])
            .map(|f| format_temperature(Some(f), Some(&unit), target)),
        condition: rich(weather, &["summary", "condition"]),
        humidity: number(weather, &["humidity"]),
        wind: number(weather, &["wind_speed", "wind"]),
    }
}

/// Build the eight rotating cards. Always eight, whatever the payload holds.
pub fn compose_cards(payload: &DashboardPayload, prefs: &DisplayPrefs) -> Vec<Card> {
    let DashboardPayload { weather, news, astronomy, calendar } = payload;

    let events = entries(calendar, "upcoming")
        .iter()
        .map(|e| CalendarEvent {
            title: rich(e, &["title"]).unwrap_or_else(|| "Evento".into()),
            start: plain(e, &["start", "when"]),
        })
        .collect();

    let harvest = entries(calendar, "harvest")
        .iter()
        .map(|i| HarvestItem {
            name: rich(i, &["name", "crop"]).unwrap_or_else(|| "Actividad".into()),
            status: rich(i, &["status", "detail"]),
        })
        .collect();

    let mut saints = strings(calendar.get("saints"));
    saints.extend(strings(calendar.get("namedays")));

    let headlines = entries(news, "items")
        .iter()
        .map(|i| NewsItem {
            title: rich(i, &["title"]).unwrap_or_else(|| "Titular".into()),
            summary: rich(i, &["summary", "description"]),
            source: rich(i, &["source"]),
        })
        .collect();

    let moon_phase = rich(astronomy, &["moon_phase"]);
    let ephemerides = EphemeridesView {
        sunrise: rich(astronomy, &["sunrise"]),
        sunset: rich(astronomy, &["sunset"]),
        moon_phase: moon_phase.clone(),
        events: entries(astronomy, "events")
            .iter()
            .filter_map(|e| rich(e, &["description", "title"]))
            .collect(),
    };

    vec![
        Card::new("time", 8000, CardBody::Time { zone: prefs.zone.clone() }),
        Card::new("weather", 10000, CardBody::Weather(weather_view(weather, prefs.unit))),
        Card::new("calendar", 10000, CardBody::Calendar { events, zone: prefs.zone.clone() }),
        Card::new(
            "moon",
            10000,
            CardBody::Moon {
                phase: moon_phase,
                illumination: number(astronomy, &["moon_illumination", "illumination"]),
            },
        ),
        Card::new("harvest", 12000, CardBody::Harvest(harvest)),
        Card::new("saints", 12000, CardBody::Saints(saints)),
        Card::new("news", 20000, CardBody::News(headlines)),
        Card::new("ephemerides", 20000, CardBody::Ephemerides(ephemerides)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Syncing,
    Updated(DateTime<Utc>),
    Unavailable,
}

impl RefreshStatus {
    pub fn label(&self, zone: &DisplayZone) -> String {
        match self {
            RefreshStatus::Syncing => "Sincronizando datos…".to_string(),
            RefreshStatus::Updated(at) => format!("Actualizado {}", clock_label(&zone.localize(*at))),
            RefreshStatus::Unavailable => "Datos no disponibles".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new card list went out
    Published,
    Unchanged,
    /// The aggregator was torn down while fetching
    Discarded,
}

pub struct DashboardAggregator<S: FeedSource> {
    source: S,
    prefs: DisplayPrefs,
    alive: Arc<AtomicBool>,
    cards_tx: watch::Sender<Vec<Card>>,
    status_tx: watch::Sender<RefreshStatus>,
}

impl<S: FeedSource> DashboardAggregator<S> {
    /// Starts out with cards composed from an empty payload.
    pub fn new(source: S, prefs: DisplayPrefs) -> Self {
        let cards = compose_cards(&DashboardPayload::default(), &prefs);
        let (cards_tx, _) = watch::channel(cards);
        let (status_tx, _) = watch::channel(RefreshStatus::Syncing);
        Self { source, prefs, alive: Arc::new(AtomicBool::new(true)), cards_tx, status_tx }
    }

    pub fn subscribe_cards(&self) -> watch::Receiver<Vec<Card>> {
        self.cards_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RefreshStatus> {
        self.status_tx.subscribe()
    }

    pub fn cards(&self) -> Vec<Card> {
        self.cards_tx.borrow().clone()
    }

    pub fn status(&self) -> RefreshStatus {
        *self.status_tx.borrow()
    }

    pub fn status_label(&self) -> String {
        self.status().label(&self.prefs.zone)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Results of fetches still in flight are dropped from now on.
    pub fn teardown(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            debug!("dashboard aggregator torn down");
        }
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let alive = Arc::clone(&self.alive);
        if !alive.load(Ordering::SeqCst) {
            return RefreshOutcome::Discarded;
        }

        let (payload, ok) = fetch_payload(&self.source).await;
        if !alive.load(Ordering::SeqCst) {
            debug!("refresh finished after teardown, discarded");
            return RefreshOutcome::Discarded;
        }

        self.status_tx.send_if_modified(|status| {
            let next = if ok > 0 {
                RefreshStatus::Updated(Utc::now())
            } else if let RefreshStatus::Updated(at) = *status {
                RefreshStatus::Updated(at)
            } else {
                RefreshStatus::Unavailable
            };
            let changed = *status != next;
            *status = next;
            changed
        });

        let cards = compose_cards(&payload, &self.prefs);
        let published = self.cards_tx.send_if_modified(|current| {
            if *current == cards {
                false
            } else {
                *current = cards;
                true
            }
        });
        if published {
            info!("dashboard cards replaced ({} of 4 feeds answered)", ok);
            RefreshOutcome::Published
        } else {
            debug!("dashboard content unchanged");
            RefreshOutcome::Unchanged
        }
    }
}

impl<S: FeedSource + 'static> DashboardAggregator<S> {
    /// Refresh now and then every `interval` until stopped.
    pub fn start_polling(self: &Arc<Self>, interval: Duration) -> PollingHandle {
        let (stop_tx, mut stop_rx) = mpsc::channel(1);
        let aggregator = Arc::clone(self);

        let task = tokio::spawn(async move {
            loop {
                // a stop abandons the refresh in flight
                tokio::select! {
                    _ = aggregator.refresh() => {}
                    _ = stop_rx.recv() => {
                        info!("Dashboard polling stopped during refresh. Exiting.");
                        break;
                    }
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.recv() => {
                        info!("Dashboard polling received stop signal. Exiting.");
                        break;
                    }
                }
            }
        });

        PollingHandle {
            alive: Arc::clone(&self.alive),
            stop_sender: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// Background refresh task of a `DashboardAggregator`
pub struct PollingHandle {
    alive: Arc<AtomicBool>,
    stop_sender: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollingHandle {
    pub async fn stop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(sender) = self.stop_sender.take() {
            if let Err(e) = sender.send(()).await {
                error!("Failed to send stop signal to dashboard polling: {}", e);
            }
        }
        if let Some(task) = self.task.take() {
            task.await.unwrap_or_else(|e| error!("Dashboard polling failed to join: {}", e));
        }
        info!("Dashboard polling stopped.");
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(sender) = self.stop_sender.take() {
            if let Err(e) = sender.try_send(()) {
                error!("Failed to send stop signal to dashboard polling on drop: {}", e);
            }
        }
    }
}
