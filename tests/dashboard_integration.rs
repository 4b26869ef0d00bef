/*
 *  dashboard_integration.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Feeds down end to end: aggregation, sentinel cards and rotation
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

use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use pantalla::aggregator::{DashboardAggregator, DisplayPrefs, RefreshStatus};
use pantalla::api::{ApiError, Feed, FeedSource};
use pantalla::rotation::spawn_rotation;

struct DeadBackend;

impl FeedSource for DeadBackend {
    async fn fetch(&self, feed: Feed) -> Result<Value, ApiError> {
        Err(ApiError::Status { path: feed.path().to_string(), status: 502 })
    }
}

const IDS: [&str; 8] =
    ["time", "weather", "calendar", "moon", "harvest", "saints", "news", "ephemerides"];

#[tokio::test]
async fn test_failing_feeds_render_sentinels() {
    let agg = DashboardAggregator::new(DeadBackend, DisplayPrefs::default());
    agg.refresh().await;

    let cards = agg.cards();
    let ids: Vec<_> = cards.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, IDS);
    assert_eq!(agg.status(), RefreshStatus::Unavailable);

    let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
    let rendered: Vec<_> = cards.iter().map(|c| c.render(now)).collect();
    assert_eq!(rendered[0].lines, ["09:30:00", "domingo, 1 de junio de 2025"]);
    assert_eq!(
        rendered[1].lines,
        ["--°C", "Unidad °C", "Sin datos meteorológicos", "Humedad --", "Viento --"]
    );
    assert_eq!(rendered[2].lines, ["No hay eventos próximos"]);
    assert_eq!(rendered[3].lines, ["Sin datos", "Iluminación --"]);
    assert_eq!(rendered[4].lines, ["Sin datos de cultivo"]);
    assert_eq!(rendered[5].lines, ["Sin onomásticas registradas"]);
    assert_eq!(rendered[6].lines, ["Sin titulares disponibles"]);
    assert_eq!(
        rendered[7].lines,
        ["Amanecer --:--", "Atardecer --:--", "Fase lunar Sin datos", "Sin efemérides registradas"]
    );
    for r in &rendered {
        for line in &r.lines {
            assert!(!line.contains("NaN") && !line.contains("null"), "{}", line);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_rotation_cycles_all_cards_with_feeds_down() {
    let agg = Arc::new(DashboardAggregator::new(DeadBackend, DisplayPrefs::default()));
    let mut polling = agg.start_polling(Duration::from_secs(60));
    let mut rotation = spawn_rotation(agg.subscribe_cards());

    let mut seen: Vec<String> = Vec::new();
    for _ in 0..110 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let view = rotation.current();
        assert_eq!(view.total, 8);
        if seen.last() != Some(&view.card.id) {
            seen.push(view.card.id.clone());
        }
    }

    assert_eq!(&seen[..8], IDS);
    assert_eq!(seen.get(8).map(String::as_str), Some("time"));

    rotation.stop().await;
    polling.stop().await;
    assert!(!agg.is_alive());
}
