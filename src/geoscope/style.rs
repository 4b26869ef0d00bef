/*
 *  geoscope/style.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Basemap style and a headless map surface that keeps a MapLibre
 *  compatible style document plus camera state in memory
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

use log::{debug, info};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};

use super::features::FeatureCollection;
use super::surface::{
    Camera, HostRect, LayerPaint, LayerSpec, LngLat, LngLatBounds, MapError, MapFactory, MapId,
    MapOptions, MapSurface, Padding, SourceSpec, Visibility,
};

pub const BASEMAP_SOURCE_ID: &str = "carto";
pub const BASEMAP_ATTRIBUTION: &str = "© OpenStreetMap contributors, © CARTO";
pub const BASEMAP_TILE_SIZE: u32 = 256;
pub const BASEMAP_TILES: [&str; 3] = [
    "https://a.basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}.png",
    "https://b.basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}.png",
    "https://c.basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}.png",
];

/// world width in pixels at zoom 0 (two 256 tiles, as MapLibre)
const WORLD_PX: f64 = 512.0;
const MAX_ZOOM: f64 = 22.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

/// Initial map construction: global extent, non interactive, raster basemap only.
pub fn basemap_style() -> MapOptions {
    MapOptions {
        center: LngLat::new(0.0, 0.0),
        zoom: 1.0,
        interactive: false,
        render_world_copies: true,
        sources: vec![(
            BASEMAP_SOURCE_ID.to_string(),
            SourceSpec::Raster {
                tiles: BASEMAP_TILES.iter().map(|t| t.to_string()).collect(),
                tile_size: BASEMAP_TILE_SIZE,
                attribution: BASEMAP_ATTRIBUTION.to_string(),
            },
        )],
        layers: vec![LayerSpec {
            id: BASEMAP_SOURCE_ID.to_string(),
            source: BASEMAP_SOURCE_ID.to_string(),
            paint: LayerPaint::Raster,
            visibility: Visibility::Visible,
        }],
    }
}

fn mercator_x(lng: f64) -> f64 {
    (lng + 180.0) / 360.0 * WORLD_PX
}

fn mercator_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let y = (PI / 4.0 + lat / 2.0).tan().ln();
    (1.0 - y / PI) * WORLD_PX / 2.0
}

fn unproject(x: f64, y: f64) -> LngLat {
    let lng = x / WORLD_PX * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * y / WORLD_PX);
    let lat = n.sinh().atan().to_degrees();
    LngLat::new(lng, lat)
}

/// Camera that frames `bounds` inside `host` less `padding`.
pub fn camera_for_bounds(
    bounds: LngLatBounds,
    host: HostRect,
    padding: Padding,
) -> Result<Camera, MapError> {
    if !bounds.is_valid() {
        return Err(MapError::FitFailed(format!("invalid bounds {:?}", bounds)));
    }
    let avail_w = host.width - padding.left - padding.right;
    let avail_h = host.height - padding.top - padding.bottom;
    if !(avail_w > 0.0 && avail_h > 0.0) {
        return Err(MapError::FitFailed(format!(
            "no room inside {} after padding",
            host
        )));
    }

    let (x0, x1) = (mercator_x(bounds.sw.lng), mercator_x(bounds.ne.lng));
    let (y0, y1) = (mercator_y(bounds.ne.lat), mercator_y(bounds.sw.lat));
    let span_x = x1 - x0;
    let span_y = y1 - y0;
    if !(span_x > 0.0 && span_y > 0.0) {
        return Err(MapError::FitFailed("degenerate bounds".into()));
    }

    let scale = (avail_w / span_x).min(avail_h / span_y);
    let zoom = scale.log2().clamp(0.0, MAX_ZOOM);
    let center = unproject((x0 + x1) / 2.0, (y0 + y1) / 2.0);

    Ok(Camera { center, zoom, padding })
}

fn paint_json(paint: &LayerPaint) -> Value {
    let mut out = Map::new();
    match paint {
        LayerPaint::Raster => {}
        LayerPaint::Fill { color, opacity } => {
            out.insert("fill-color".into(), json!(color));
            out.insert("fill-opacity".into(), json!(opacity));
        }
        LayerPaint::Line { color, width, dash } => {
            out.insert("line-color".into(), json!(color));
            out.insert("line-width".into(), json!(width));
            if let Some(dash) = dash {
                out.insert("line-dasharray".into(), json!(dash));
            }
        }
        LayerPaint::Circle {
            radius,
            color,
            opacity,
            blur,
            stroke_color,
            stroke_width,
        } => {
            out.insert("circle-radius".into(), json!(radius));
            out.insert("circle-color".into(), json!(color));
            if let Some(v) = opacity {
                out.insert("circle-opacity".into(), json!(v));
            }
            if let Some(v) = blur {
                out.insert("circle-blur".into(), json!(v));
            }
            if let Some(v) = stroke_color {
                out.insert("circle-stroke-color".into(), json!(v));
            }
            if let Some(v) = stroke_width {
                out.insert("circle-stroke-width".into(), json!(v));
            }
        }
    }
    Value::Object(out)
}

fn layer_json(layer: &LayerSpec) -> Value {
    json!({
        "id": layer.id,
        "type": layer.paint.kind(),
        "source": layer.source,
        "layout": { "visibility": layer.visibility },
        "paint": paint_json(&layer.paint),
    })
}

/// In-memory map: sources, stacked layers and a camera.
#[derive(Debug)]
pub struct StyleMap {
    id: MapId,
    host: HostRect,
    interactive: bool,
    render_world_copies: bool,
    sources: BTreeMap<String, SourceSpec>,
    layers: Vec<LayerSpec>,
    camera: Camera,
    removed: bool,
}

impl StyleMap {
    pub fn new(host: HostRect, options: &MapOptions) -> Result<Self, MapError> {
        if !host.is_drawable() {
            return Err(MapError::ZeroSizedSurface(host.width, host.height));
        }
        let mut map = StyleMap {
            id: MapId(NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed)),
            host,
            interactive: options.interactive,
            render_world_copies: options.render_world_copies,
            sources: BTreeMap::new(),
            layers: Vec::new(),
            camera: Camera {
                center: options.center,
                zoom: options.zoom,
                padding: Padding::zero(),
            },
            removed: false,
        };
        for (id, spec) in &options.sources {
            map.add_source(id, spec.clone())?;
        }
        for layer in &options.layers {
            map.add_layer(layer.clone())?;
        }
        debug!("{} created at {}", map.id, host);
        Ok(map)
    }

    pub fn host(&self) -> HostRect {
        self.host
    }

    /// Layer ids bottom to top
    pub fn layer_order(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.id.clone()).collect()
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id)
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    fn live(&self) -> Result<(), MapError> {
        if self.removed { Err(MapError::Removed) } else { Ok(()) }
    }

    fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }
}

impl MapSurface for StyleMap {
    fn id(&self) -> MapId {
        self.id
    }

    fn has_source(&self, id: &str) -> bool {
        !self.removed && self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, spec: SourceSpec) -> Result<(), MapError> {
        self.live()?;
        if self.sources.contains_key(id) {
            return Err(MapError::SourceExists(id.to_string()));
        }
        self.sources.insert(id.to_string(), spec);
        Ok(())
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError> {
        self.live()?;
        match self.sources.get_mut(id) {
            Some(SourceSpec::GeoJson { data: current }) => {
                *current = data;
                Ok(())
            }
            Some(SourceSpec::Raster { .. }) => Err(MapError::Backend(format!(
                "source '{}' is raster and takes no feature data",
                id
            ))),
            None => Err(MapError::SourceMissing(id.to_string())),
        }
    }

    fn remove_source(&mut self, id: &str) -> Result<(), MapError> {
        self.live()?;
        if let Some(user) = self.layers.iter().find(|l| l.source == id) {
            return Err(MapError::Backend(format!(
                "source '{}' is still used by layer '{}'",
                id, user.id
            )));
        }
        self.sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MapError::SourceMissing(id.to_string()))
    }

    fn has_layer(&self, id: &str) -> bool {
        !self.removed && self.layer_index(id).is_some()
    }

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), MapError> {
        self.live()?;
        if self.layer_index(&spec.id).is_some() {
            return Err(MapError::LayerExists(spec.id));
        }
        if !self.sources.contains_key(&spec.source) {
            return Err(MapError::SourceMissing(spec.source));
        }
        self.layers.push(spec);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), MapError> {
        self.live()?;
        let idx = self
            .layer_index(id)
            .ok_or_else(|| MapError::LayerMissing(id.to_string()))?;
        self.layers.remove(idx);
        Ok(())
    }

    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), MapError> {
        self.live()?;
        let idx = self
            .layer_index(id)
            .ok_or_else(|| MapError::LayerMissing(id.to_string()))?;
        if let Some(b) = before {
            if self.layer_index(b).is_none() {
                return Err(MapError::LayerMissing(b.to_string()));
            }
        }
        let layer = self.layers.remove(idx);
        let at = match before {
            Some(b) => self.layer_index(b).unwrap_or(self.layers.len()),
            None => self.layers.len(),
        };
        self.layers.insert(at, layer);
        Ok(())
    }

    fn set_visibility(&mut self, id: &str, visibility: Visibility) -> Result<(), MapError> {
        self.live()?;
        let idx = self
            .layer_index(id)
            .ok_or_else(|| MapError::LayerMissing(id.to_string()))?;
        self.layers[idx].visibility = visibility;
        Ok(())
    }

    fn set_padding(&mut self, padding: Padding) {
        if !self.removed {
            self.camera.padding = padding;
        }
    }

    fn jump_to(&mut self, center: LngLat, zoom: f64) {
        if !self.removed {
            self.camera.center = center;
            self.camera.zoom = zoom.clamp(0.0, MAX_ZOOM);
        }
    }

    fn fit_bounds(&mut self, bounds: LngLatBounds, _animate: bool) -> Result<(), MapError> {
        self.live()?;
        self.camera = camera_for_bounds(bounds, self.host, self.camera.padding)?;
        Ok(())
    }

    fn resize(&mut self, host: HostRect) {
        if !self.removed {
            self.host = host;
        }
    }

    fn camera(&self) -> Camera {
        self.camera
    }

    fn remove(&mut self) {
        if !self.removed {
            info!("{} removed", self.id);
            self.removed = true;
            self.layers.clear();
            self.sources.clear();
        }
    }

    fn style_document(&self) -> Value {
        let sources: Map<String, Value> = self
            .sources
            .iter()
            .map(|(id, spec)| (id.clone(), serde_json::to_value(spec).unwrap_or(Value::Null)))
            .collect();
        json!({
            "version": 8,
            "center": [self.camera.center.lng, self.camera.center.lat],
            "zoom": self.camera.zoom,
            "interactive": self.interactive,
            "renderWorldCopies": self.render_world_copies,
            "sources": sources,
            "layers": self.layers.iter().map(layer_json).collect::<Vec<_>>(),
        })
    }
}

/// Builds `StyleMap`s; refuses zero area hosts.
#[derive(Debug, Default)]
pub struct StyleMapFactory;

impl MapFactory for StyleMapFactory {
    fn create(
        &mut self,
        host: HostRect,
        options: &MapOptions,
    ) -> Result<Box<dyn MapSurface>, MapError> {
        Ok(Box::new(StyleMap::new(host, options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> LngLatBounds {
        LngLatBounds::new(LngLat::new(-180.0, -60.0), LngLat::new(180.0, 85.0))
    }

    #[test]
    fn test_refuses_zero_host() {
        let err = StyleMap::new(HostRect::new(0.0, 400.0), &basemap_style()).unwrap_err();
        assert_eq!(err, MapError::ZeroSizedSurface(0.0, 400.0));
    }

    #[test]
    fn test_basemap_has_mirrors() {
        let map = StyleMap::new(HostRect::new(800.0, 600.0), &basemap_style()).unwrap();
        let doc = map.style_document();
        assert_eq!(doc["sources"]["carto"]["tiles"].as_array().unwrap().len(), 3);
        assert_eq!(doc["sources"]["carto"]["tileSize"], 256);
        assert_eq!(doc["layers"][0]["type"], "raster");
        assert_eq!(map.camera().zoom, 1.0);
    }

    #[test]
    fn test_fit_world_at_1280x720() {
        let cam = camera_for_bounds(world(), HostRect::new(1280.0, 720.0), Padding::uniform(8.0))
            .unwrap();
        // height limited: 704px over ~362px of mercator span
        assert!(cam.zoom > 0.9 && cam.zoom < 1.0, "zoom {}", cam.zoom);
        assert!(cam.center.lng.abs() < 1e-9);
        assert!(cam.center.lat > 0.0);
    }

    #[test]
    fn test_fit_fails_when_padding_eats_host() {
        let res = camera_for_bounds(world(), HostRect::new(16.0, 300.0), Padding::uniform(8.0));
        assert!(matches!(res, Err(MapError::FitFailed(_))));
    }

    #[test]
    fn test_move_layer_restacks() {
        let mut map = StyleMap::new(HostRect::new(100.0, 100.0), &basemap_style()).unwrap();
        map.add_source("s", SourceSpec::empty_geojson()).unwrap();
        for id in ["a", "b"] {
            map.add_layer(LayerSpec {
                id: id.into(),
                source: "s".into(),
                paint: LayerPaint::Fill { color: "#fff", opacity: 1.0 },
                visibility: Visibility::Visible,
            })
            .unwrap();
        }
        map.move_layer("b", Some("a")).unwrap();
        assert_eq!(map.layer_order(), vec!["carto", "b", "a"]);
        map.move_layer("carto", None).unwrap();
        assert_eq!(map.layer_order(), vec!["b", "a", "carto"]);
    }

    #[test]
    fn test_removed_map_rejects_mutation() {
        let mut map = StyleMap::new(HostRect::new(100.0, 100.0), &basemap_style()).unwrap();
        map.remove();
        assert!(map.is_removed());
        assert_eq!(map.add_source("x", SourceSpec::empty_geojson()), Err(MapError::Removed));
        assert!(!map.has_layer("carto"));
    }
}
