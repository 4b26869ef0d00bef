/*
 *  geoscope/controller.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Map lifecycle: deferred creation, safe framing, resize handling and
 *  ownership of the overlay registry
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

use log::{debug, info, warn};

use super::features::FeatureCollection;
use super::layers::default_layers;
use super::registry::LayerRegistry;
use super::surface::{
    HostRect, LngLat, LngLatBounds, MapError, MapFactory, MapOptions, MapSurface, Padding,
};

/// Below this (either side) the globe is centred instead of framed
pub const MIN_FIT_SIZE: f64 = 120.0;
pub const FIT_PADDING: f64 = 8.0;
pub const WORLD_BOUNDS: LngLatBounds =
    LngLatBounds::new(LngLat::new(-180.0, -60.0), LngLat::new(180.0, 85.0));
pub const NEUTRAL_CENTER: LngLat = LngLat::new(0.0, 0.0);
pub const NEUTRAL_ZOOM: f64 = 1.0;

/// The element the map is mounted into.
pub trait HostElement: Send {
    fn bounding_box(&self) -> HostRect;

    /// Whether size changes of the element itself can be observed; when
    /// not, window resize events are used instead.
    fn supports_resize_observer(&self) -> bool {
        true
    }
}

/// How resize notifications reach the controller, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStrategy {
    Observer,
    WindowFallback,
}

impl ResizeStrategy {
    pub fn select(host: &dyn HostElement) -> Self {
        if host.supports_resize_observer() {
            ResizeStrategy::Observer
        } else {
            ResizeStrategy::WindowFallback
        }
    }

    fn accepts(&self, notice: &ResizeNotice) -> bool {
        matches!(
            (self, notice),
            (ResizeStrategy::Observer, ResizeNotice::Observed(_))
                | (ResizeStrategy::WindowFallback, ResizeNotice::Window)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeNotice {
    /// element observer fired, with its content box when it carried one
    Observed(Option<HostRect>),
    Window,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DegradeReason {
    HostTooSmall(HostRect),
    FitFailed(MapError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    Framed,
    Degraded(DegradeReason),
}

fn center_neutral(map: &mut dyn MapSurface) {
    map.set_padding(Padding::zero());
    map.jump_to(NEUTRAL_CENTER, NEUTRAL_ZOOM);
}

/// Frame the world bounds inside `host`, or fall back to a neutral,
/// unpadded globe when the host is too small or the fit itself fails.
pub fn safe_fit(map: &mut dyn MapSurface, host: HostRect) -> FitOutcome {
    debug!("safe fit, host {}", host);
    if !(host.width >= MIN_FIT_SIZE && host.height >= MIN_FIT_SIZE) {
        center_neutral(map);
        info!("safe fit degraded: host {} too small", host);
        return FitOutcome::Degraded(DegradeReason::HostTooSmall(host));
    }

    map.set_padding(Padding::uniform(FIT_PADDING));
    match map.fit_bounds(WORLD_BOUNDS, false) {
        Ok(()) => FitOutcome::Framed,
        Err(e) => {
            warn!("safe fit failed ({}), centering globe", e);
            center_neutral(map);
            FitOutcome::Degraded(DegradeReason::FitFailed(e))
        }
    }
}

/// Owns at most one map for its host and the registry layered on it.
pub struct MapCompositionController<H: HostElement, F: MapFactory> {
    host: H,
    factory: F,
    options: MapOptions,
    resize: Option<ResizeStrategy>,
    map: Option<Box<dyn MapSurface>>,
    registry: Option<LayerRegistry>,
    ready: bool,
}

impl<H: HostElement, F: MapFactory> MapCompositionController<H, F> {
    /// Connects resize observation and makes a first creation attempt.
    pub fn new(host: H, factory: F, options: MapOptions) -> Self {
        let strategy = ResizeStrategy::select(&host);
        debug!("resize strategy {:?}", strategy);
        let mut controller = Self {
            host,
            factory,
            options,
            resize: Some(strategy),
            map: None,
            registry: None,
            ready: false,
        };
        controller.ensure_create();
        controller
    }

    /// Returns whether a map exists once the call completes.
    pub fn ensure_create(&mut self) -> bool {
        if self.map.is_some() {
            return true;
        }
        if self.resize.is_none() {
            debug!("controller torn down, not creating a map");
            return false;
        }

        let rect = self.host.bounding_box();
        debug!("measuring host before map init: {}", rect);
        if !rect.is_drawable() {
            info!("host size is zero, delaying map creation");
            return false;
        }

        match self.factory.create(rect, &self.options) {
            Ok(map) => {
                info!("map instance {} created at {}", map.id(), rect);
                self.map = Some(map);
                true
            }
            Err(e) => {
                warn!("map creation failed, retrying on next resize: {}", e);
                false
            }
        }
    }

    /// Map load signal: frame the view and register the default overlays.
    pub fn on_map_ready(&mut self) {
        let Some(map) = self.map.as_mut() else {
            debug!("ready signal without a map, ignored");
            return;
        };
        let map = map.as_mut();
        info!("map {} loaded", map.id());
        self.ready = true;

        if let Some(old) = self.registry.take() {
            old.destroy(map);
        }

        if let FitOutcome::Degraded(reason) = safe_fit(map, self.host.bounding_box()) {
            debug!("initial framing degraded: {:?}", reason);
        }

        let mut registry = LayerRegistry::new(map);
        for layer in default_layers() {
            let id = layer.id().to_string();
            if let Err(e) = registry.add(map, layer) {
                warn!("failed to register layer {}: {}", id, e);
            }
        }
        self.registry = Some(registry);
    }

    pub fn on_resize(&mut self, notice: ResizeNotice) {
        let Some(strategy) = self.resize else {
            return;
        };
        if !strategy.accepts(&notice) {
            debug!("{:?} ignored under {:?}", notice, strategy);
            return;
        }

        let Some(map) = self.map.as_mut() else {
            self.ensure_create();
            return;
        };

        let rect = match notice {
            ResizeNotice::Observed(Some(rect)) => rect,
            _ => self.host.bounding_box(),
        };
        debug!("resize {}", rect);
        map.resize(rect);
        if self.ready {
            safe_fit(map.as_mut(), self.host.bounding_box());
        }
    }

    /// Disconnect, destroy overlays, remove the map. Safe to repeat.
    pub fn teardown(&mut self) {
        if self.resize.take().is_some() {
            debug!("resize observation disconnected");
        }
        let registry = self.registry.take();
        if let Some(mut map) = self.map.take() {
            if let Some(registry) = registry {
                registry.destroy(map.as_mut());
            }
            map.remove();
            info!("map {} torn down", map.id());
        }
        self.ready = false;
    }

    pub fn set_layer_enabled(&mut self, id: &str, on: bool) -> bool {
        let (Some(map), Some(registry), true) =
            (self.map.as_mut(), self.registry.as_mut(), self.ready)
        else {
            debug!("map not ready, layer {} toggle dropped", id);
            return false;
        };
        match registry.set_enabled(map.as_mut(), id, on) {
            Ok(found) => found,
            Err(e) => {
                warn!("toggling layer {} failed: {}", id, e);
                false
            }
        }
    }

    pub fn set_layer_features(&mut self, id: &str, data: FeatureCollection) -> bool {
        let (Some(map), Some(registry), true) =
            (self.map.as_mut(), self.registry.as_mut(), self.ready)
        else {
            debug!("map not ready, {} features for {} dropped", data.len(), id);
            return false;
        };
        match registry.set_features(map.as_mut(), id, data) {
            Ok(found) => found,
            Err(e) => {
                warn!("updating layer {} failed: {}", id, e);
                false
            }
        }
    }

    pub fn has_map(&self) -> bool {
        self.map.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn resize_strategy(&self) -> Option<ResizeStrategy> {
        self.resize
    }

    pub fn map(&self) -> Option<&dyn MapSurface> {
        self.map.as_deref()
    }

    pub fn layer_ids(&self) -> Vec<String> {
        self.registry
            .as_ref()
            .map(|r| r.layer_ids().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

impl<H: HostElement, F: MapFactory> Drop for MapCompositionController<H, F> {
    fn drop(&mut self) {
        self.teardown();
    }
}
