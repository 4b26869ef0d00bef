/*
 *  main.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Kiosk core entry point
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

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use env_logger::Env;
use log::{debug, info, warn};
use serde_json::Value;
use std::{fs, sync::Arc};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use pantalla::aggregator::{DashboardAggregator, DisplayPrefs};
use pantalla::api::{ApiClient, Connectivity};
use pantalla::appconfig::AppConfig;
use pantalla::config::{self, Cli, Command, Settings};
use pantalla::geoscope::{
    HostElement, HostRect, MapCompositionController, StyleMapFactory, basemap_style,
};
use pantalla::rotation::spawn_rotation;
use pantalla::sanitize::strip_tags;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Host box of the headless map, fixed by the settings
struct FixedHost {
    rect: HostRect,
    observer: bool,
}

impl HostElement for FixedHost {
    fn bounding_box(&self) -> HostRect {
        self.rect
    }

    fn supports_resize_observer(&self) -> bool {
        self.observer
    }
}

type Controller = MapCompositionController<FixedHost, StyleMapFactory>;

fn build_controller(settings: &Settings) -> Controller {
    let host = FixedHost { rect: settings.host_rect(), observer: settings.resize_observer() };
    let mut controller = MapCompositionController::new(host, StyleMapFactory, basemap_style());
    // the headless map has nothing to load
    if controller.has_map() {
        controller.on_map_ready();
    }
    controller
}

/// Waits for SIGINT, SIGTERM or SIGHUP.
#[cfg(unix)]
async fn signal_handler() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

async fn run(settings: &Settings, api: ApiClient) -> Result<()> {
    let app = match api.get_config().await {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("remote configuration unavailable, using defaults: {}", e);
            AppConfig::default()
        }
    };
    let prefs = DisplayPrefs::from_config(&app);
    info!("display zone {:?}, temperature in {}", prefs.zone, prefs.unit);

    let mut controller = build_controller(settings);
    if controller.is_ready() {
        info!("geoscope layers: {}", controller.layer_ids().join(", "));
    } else {
        warn!("map not created for host box {}", controller.host().rect);
    }

    let aggregator = Arc::new(DashboardAggregator::new(api.clone(), prefs.clone()));
    let mut polling = aggregator.start_polling(settings.refresh_interval());
    let mut rotation = spawn_rotation(aggregator.subscribe_cards());
    let mut view_rx = rotation.subscribe();

    let mut health_tick = tokio::time::interval(settings.refresh_interval());
    let mut connectivity: Option<Connectivity> = None;

    let shutdown = signal_handler();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    warn!("signal handling failed: {}", e);
                }
                break;
            }
            changed = view_rx.changed() => {
                if changed.is_err() {
                    warn!("rotation task ended");
                    break;
                }
                let view = view_rx.borrow_and_update().clone();
                if view.transitioning {
                    debug!("transition from card {}", view.index);
                    continue;
                }
                let rendered = view.card.render(Utc::now());
                info!(
                    "[{}/{}] {} ({})",
                    view.index + 1,
                    view.total,
                    rendered.title.as_deref().unwrap_or(&view.card.id),
                    aggregator.status_label()
                );
                for line in rendered.lines {
                    info!("    {}", strip_tags(&line));
                }
            }
            _ = health_tick.tick() => {
                let state = api.ping().await;
                if connectivity != Some(state) {
                    info!("backend {} at {}", state, api.base());
                    connectivity = Some(state);
                }
            }
        }
    }

    controller.teardown();
    rotation.stop().await;
    polling.stop().await;
    info!("Pantalla stopped.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load(&cli).context("loading settings")?;
    if cli.dump_config {
        println!("{}", config::dump(&settings).context("dumping settings")?);
        return Ok(());
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log_level()))
        .format_timestamp_secs()
        .init();

    info!("Pantalla v{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);
    debug!("settings {:?}", settings);

    let api = ApiClient::new(settings.api_base(), settings.request_timeout())
        .context("building API client")?;

    match cli.command() {
        Command::Run => run(&settings, api).await,
        Command::ConfigGet => {
            let cfg = api.get_config().await.context("fetching configuration")?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
        Command::ConfigPut { file } => {
            let body = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let doc: Value = serde_json::from_str(&body)
                .with_context(|| format!("parsing {}", file.display()))?;
            let cfg = AppConfig::from_value(doc).context("configuration document")?;
            let saved = api.put_config(&cfg).await.context("storing configuration")?;
            println!("{}", serde_json::to_string_pretty(&saved)?);
            Ok(())
        }
        Command::Health => {
            println!("{}", api.ping().await);
            Ok(())
        }
        Command::Style => {
            let mut controller = build_controller(&settings);
            let Some(map) = controller.map() else {
                bail!("no map for host box {}", settings.host_rect());
            };
            println!("{}", serde_json::to_string_pretty(&map.style_document())?);
            controller.teardown();
            Ok(())
        }
    }
}
