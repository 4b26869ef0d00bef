/*
 *  geoscope/layers.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Togglable overlay layers: one GeoJSON source plus one visual layer each
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

use log::{debug, warn};

use super::features::FeatureCollection;
use super::surface::{LayerPaint, LayerSpec, MapError, MapId, MapSurface, SourceSpec, Visibility};

/// Capability set shared by every overlay.
///
/// Layers never hold the map itself, only the id of the map they were
/// attached to; each call is handed the map it should act on.
pub trait OverlayLayer: Send {
    fn id(&self) -> &str;
    fn z_index(&self) -> i32;
    fn is_enabled(&self) -> bool;
    fn is_attached(&self) -> bool;

    /// Register source and visual layer, idempotent per map.
    fn attach(&mut self, map: &mut dyn MapSurface) -> Result<(), MapError>;
    /// Unregister visual layer then source, idempotent.
    fn detach(&mut self, map: &mut dyn MapSurface) -> Result<(), MapError>;
    fn set_enabled(&mut self, map: &mut dyn MapSurface, on: bool) -> Result<(), MapError>;
    fn set_features(
        &mut self,
        map: &mut dyn MapSurface,
        data: FeatureCollection,
    ) -> Result<(), MapError>;
    /// Forget the map binding; never touches the map.
    fn destroy(&mut self);
}

/// Common state and behaviour behind the five overlay variants
#[derive(Debug, Clone)]
pub struct ToggleLayer {
    id: &'static str,
    source_id: &'static str,
    z_index: i32,
    paint: LayerPaint,
    enabled: bool,
    map: Option<MapId>,
}

impl ToggleLayer {
    pub fn new(
        id: &'static str,
        source_id: &'static str,
        z_index: i32,
        paint: LayerPaint,
        enabled: bool,
    ) -> Self {
        Self { id, source_id, z_index, paint, enabled, map: None }
    }

    pub fn source_id(&self) -> &'static str {
        self.source_id
    }

    pub fn paint(&self) -> &LayerPaint {
        &self.paint
    }

    fn bound_to(&self, map: &dyn MapSurface) -> bool {
        self.map == Some(map.id())
    }

    fn apply_visibility(&self, map: &mut dyn MapSurface) -> Result<(), MapError> {
        if self.bound_to(map) && map.has_layer(self.id) {
            map.set_visibility(self.id, Visibility::from(self.enabled))?;
        }
        Ok(())
    }
}

impl OverlayLayer for ToggleLayer {
    fn id(&self) -> &str {
        self.id
    }

    fn z_index(&self) -> i32 {
        self.z_index
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn is_attached(&self) -> bool {
        self.map.is_some()
    }

    fn attach(&mut self, map: &mut dyn MapSurface) -> Result<(), MapError> {
        if let Some(bound) = self.map {
            if bound != map.id() {
                return Err(MapError::ForeignMap { bound, given: map.id() });
            }
        }

        let mut added_source = false;
        if !map.has_source(self.source_id) {
            map.add_source(self.source_id, SourceSpec::empty_geojson())?;
            added_source = true;
        }

        if !map.has_layer(self.id) {
            let spec = LayerSpec {
                id: self.id.to_string(),
                source: self.source_id.to_string(),
                paint: self.paint.clone(),
                visibility: Visibility::from(self.enabled),
            };
            if let Err(e) = map.add_layer(spec) {
                // never leave the source registered without its layer
                if added_source {
                    if let Err(re) = map.remove_source(self.source_id) {
                        warn!("{}: rollback of source {} failed: {}", self.id, self.source_id, re);
                    }
                }
                return Err(e);
            }
        }

        self.map = Some(map.id());
        self.apply_visibility(map)
    }

    fn detach(&mut self, map: &mut dyn MapSurface) -> Result<(), MapError> {
        if map.has_layer(self.id) {
            map.remove_layer(self.id)?;
        }
        if map.has_source(self.source_id) {
            map.remove_source(self.source_id)?;
        }
        self.map = None;
        Ok(())
    }

    fn set_enabled(&mut self, map: &mut dyn MapSurface, on: bool) -> Result<(), MapError> {
        self.enabled = on;
        self.apply_visibility(map)
    }

    fn set_features(
        &mut self,
        map: &mut dyn MapSurface,
        data: FeatureCollection,
    ) -> Result<(), MapError> {
        if !self.bound_to(map) {
            debug!("{}: not attached, dropping {} features", self.id, data.len());
            return Ok(());
        }
        map.set_source_data(self.source_id, data)
    }

    fn destroy(&mut self) {
        self.map = None;
    }
}

macro_rules! overlay_layer {
    ($(#[$meta:meta])* $name:ident, $id:literal, $z:expr, $initially:expr, $paint:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(ToggleLayer);

        impl $name {
            pub const ID: &'static str = $id;
            pub const SOURCE_ID: &'static str = concat!($id, "-source");
            pub const Z_INDEX: i32 = $z;

            pub fn new(enabled: bool) -> Self {
                Self(ToggleLayer::new(Self::ID, Self::SOURCE_ID, Self::Z_INDEX, $paint, enabled))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new($initially)
            }
        }

        impl OverlayLayer for $name {
            fn id(&self) -> &str {
                self.0.id()
            }
            fn z_index(&self) -> i32 {
                self.0.z_index()
            }
            fn is_enabled(&self) -> bool {
                self.0.is_enabled()
            }
            fn is_attached(&self) -> bool {
                self.0.is_attached()
            }
            fn attach(&mut self, map: &mut dyn MapSurface) -> Result<(), MapError> {
                self.0.attach(map)
            }
            fn detach(&mut self, map: &mut dyn MapSurface) -> Result<(), MapError> {
                self.0.detach(map)
            }
            fn set_enabled(&mut self, map: &mut dyn MapSurface, on: bool) -> Result<(), MapError> {
                self.0.set_enabled(map, on)
            }
            fn set_features(
                &mut self,
                map: &mut dyn MapSurface,
                data: FeatureCollection,
            ) -> Result<(), MapError> {
                self.0.set_features(map, data)
            }
            fn destroy(&mut self) {
                self.0.destroy()
            }
        }
    };
}

overlay_layer!(
    /// Weather polygons, drawn underneath everything else
    WeatherLayer, "geoscope-weather", 10, false,
    LayerPaint::Fill { color: "#60a5fa", opacity: 0.25 }
);

overlay_layer!(
    /// Cyclone tracks
    CyclonesLayer, "geoscope-cyclones", 20, false,
    LayerPaint::Line { color: "#34d399", width: 2.0, dash: Some([2.0, 2.0]) }
);

overlay_layer!(
    ShipsLayer, "geoscope-ships", 30, false,
    LayerPaint::Circle {
        radius: 4.0,
        color: "#38bdf8",
        opacity: None,
        blur: None,
        stroke_color: Some("#0f172a"),
        stroke_width: Some(1.0),
    }
);

overlay_layer!(
    AircraftLayer, "geoscope-aircraft", 40, false,
    LayerPaint::Circle {
        radius: 4.0,
        color: "#f97316",
        opacity: None,
        blur: None,
        stroke_color: Some("#111827"),
        stroke_width: Some(1.0),
    }
);

overlay_layer!(
    /// Lightning strikes, topmost and the only overlay shown from start
    LightningLayer, "geoscope-lightning", 50, true,
    LayerPaint::Circle {
        radius: 6.0,
        color: "#fcd34d",
        opacity: Some(0.65),
        blur: Some(0.35),
        stroke_color: None,
        stroke_width: None,
    }
);

/// The default overlay set registered once a map is ready
pub fn default_layers() -> Vec<Box<dyn OverlayLayer>> {
    vec![
        Box::new(WeatherLayer::default()),
        Box::new(CyclonesLayer::default()),
        Box::new(ShipsLayer::default()),
        Box::new(AircraftLayer::default()),
        Box::new(LightningLayer::default()),
    ]
}
