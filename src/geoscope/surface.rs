/*
 *  geoscope/surface.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Map widget seam: the capability set every map backend provides
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

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::features::FeatureCollection;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapError {
    #[error("source '{0}' already registered")]
    SourceExists(String),
    #[error("source '{0}' is not registered")]
    SourceMissing(String),
    #[error("layer '{0}' already registered")]
    LayerExists(String),
    #[error("layer '{0}' is not registered")]
    LayerMissing(String),
    #[error("cannot create a drawing surface of {0}x{1}")]
    ZeroSizedSurface(f64, f64),
    #[error("viewport fit failed: {0}")]
    FitFailed(String),
    #[error("map has been removed")]
    Removed,
    #[error("layer is bound to map {bound}, not {given}")]
    ForeignMap { bound: MapId, given: MapId },
    #[error("map backend error: {0}")]
    Backend(String),
}

/// Identity of one live map instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapId(pub u64);

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// south-west / north-east corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLatBounds {
    pub sw: LngLat,
    pub ne: LngLat,
}

impl LngLatBounds {
    pub const fn new(sw: LngLat, ne: LngLat) -> Self {
        Self { sw, ne }
    }

    pub fn is_valid(&self) -> bool {
        let finite = [self.sw.lng, self.sw.lat, self.ne.lng, self.ne.lat]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.sw.lng < self.ne.lng
            && self.sw.lat < self.ne.lat
            && self.sw.lat >= -90.0
            && self.ne.lat <= 90.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    pub const fn uniform(v: f64) -> Self {
        Self { top: v, right: v, bottom: v, left: v }
    }

    pub const fn zero() -> Self {
        Self::uniform(0.0)
    }
}

/// Host element bounding box in logical units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostRect {
    pub width: f64,
    pub height: f64,
}

impl HostRect {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A renderer can only initialise against a strictly positive area.
    pub fn is_drawable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

impl fmt::Display for HostRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    None,
}

impl From<bool> for Visibility {
    fn from(on: bool) -> Self {
        if on { Visibility::Visible } else { Visibility::None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceSpec {
    #[serde(rename = "geojson")]
    GeoJson { data: FeatureCollection },
    Raster {
        tiles: Vec<String>,
        #[serde(rename = "tileSize")]
        tile_size: u32,
        attribution: String,
    },
}

impl SourceSpec {
    pub fn empty_geojson() -> Self {
        SourceSpec::GeoJson { data: FeatureCollection::empty() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerPaint {
    Raster,
    Fill {
        color: &'static str,
        opacity: f64,
    },
    Line {
        color: &'static str,
        width: f64,
        dash: Option<[f64; 2]>,
    },
    Circle {
        radius: f64,
        color: &'static str,
        opacity: Option<f64>,
        blur: Option<f64>,
        stroke_color: Option<&'static str>,
        stroke_width: Option<f64>,
    },
}

impl LayerPaint {
    /// MapLibre layer `type` for this encoding
    pub fn kind(&self) -> &'static str {
        match self {
            LayerPaint::Raster => "raster",
            LayerPaint::Fill { .. } => "fill",
            LayerPaint::Line { .. } => "line",
            LayerPaint::Circle { .. } => "circle",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub paint: LayerPaint,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    pub center: LngLat,
    pub zoom: f64,
    pub interactive: bool,
    pub render_world_copies: bool,
    pub sources: Vec<(String, SourceSpec)>,
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub center: LngLat,
    pub zoom: f64,
    pub padding: Padding,
}

/// Everything the composition core needs from a map widget.
pub trait MapSurface: Send {
    fn id(&self) -> MapId;

    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, spec: SourceSpec) -> Result<(), MapError>;
    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError>;
    fn remove_source(&mut self, id: &str) -> Result<(), MapError>;

    fn has_layer(&self, id: &str) -> bool;
    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), MapError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), MapError>;
    /// Restack `id` directly below `before`, or to the top when `None`.
    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), MapError>;
    fn set_visibility(&mut self, id: &str, visibility: Visibility) -> Result<(), MapError>;

    fn set_padding(&mut self, padding: Padding);
    fn jump_to(&mut self, center: LngLat, zoom: f64);
    fn fit_bounds(&mut self, bounds: LngLatBounds, animate: bool) -> Result<(), MapError>;
    fn resize(&mut self, host: HostRect);
    fn camera(&self) -> Camera;

    /// Release the drawing surface; every later call may fail with `Removed`.
    fn remove(&mut self);

    /// Current style as a MapLibre style document
    fn style_document(&self) -> serde_json::Value;
}

pub trait MapFactory: Send {
    fn create(
        &mut self,
        host: HostRect,
        options: &MapOptions,
    ) -> Result<Box<dyn MapSurface>, MapError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_host_rect_drawable() {
        assert!(HostRect::new(1.0, 1.0).is_drawable());
        assert!(!HostRect::new(0.0, 600.0).is_drawable());
        assert!(!HostRect::new(800.0, -2.0).is_drawable());
        assert!(!HostRect::new(f64::NAN, 10.0).is_drawable());
    }

    #[test]
    fn test_bounds_validity() {
        let world = LngLatBounds::new(LngLat::new(-180.0, -60.0), LngLat::new(180.0, 85.0));
        assert!(world.is_valid());
        let flipped = LngLatBounds::new(LngLat::new(10.0, 0.0), LngLat::new(-10.0, 5.0));
        assert!(!flipped.is_valid());
    }

    #[test]
    fn test_source_spec_json() {
        let raster = SourceSpec::Raster {
            tiles: vec!["https://a.example/{z}/{x}/{y}.png".into()],
            tile_size: 256,
            attribution: "x".into(),
        };
        assert_eq!(
            serde_json::to_value(&raster).unwrap(),
            json!({"type": "raster", "tiles": ["https://a.example/{z}/{x}/{y}.png"], "tileSize": 256, "attribution": "x"})
        );
        let empty = serde_json::to_value(SourceSpec::empty_geojson()).unwrap();
        assert_eq!(empty["type"], "geojson");
        assert_eq!(empty["data"]["features"], json!([]));
    }
}
