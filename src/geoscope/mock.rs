/*
 *  geoscope/mock.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Recording map surface for tests
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

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::features::FeatureCollection;
use super::style::camera_for_bounds;
use super::surface::{
    Camera, HostRect, LayerSpec, LngLat, LngLatBounds, MapError, MapFactory, MapId, MapOptions,
    MapSurface, Padding, SourceSpec, Visibility,
};

static NEXT_MOCK_ID: AtomicU64 = AtomicU64::new(10_000);

/// Everything the mock saw, inspectable from the test body
#[derive(Debug, Default)]
pub struct MockMapState {
    pub ops: Vec<String>,
    pub sources: Vec<String>,
    /// bottom to top
    pub layers: Vec<String>,
    pub visibility: HashMap<String, Visibility>,
    /// feature count per source
    pub source_data: HashMap<String, usize>,
    pub camera: Option<Camera>,
    pub host: HostRect,

    pub add_source_calls: u32,
    pub add_layer_calls: u32,
    pub remove_layer_calls: u32,
    pub remove_source_calls: u32,
    pub fit_calls: u32,
    pub jump_calls: u32,
    pub resize_calls: u32,
    pub remove_calls: u32,

    pub removed: bool,
    pub fail_fit: bool,
    pub fail_add_layer_for: Vec<String>,
    pub fail_remove_layer_for: Vec<String>,
}

pub type SharedMockState = Arc<Mutex<MockMapState>>;

pub struct MockMap {
    id: MapId,
    state: SharedMockState,
}

impl MockMap {
    pub fn new() -> (Self, SharedMockState) {
        Self::with_host(HostRect::new(800.0, 600.0))
    }

    pub fn with_host(host: HostRect) -> (Self, SharedMockState) {
        let state = Arc::new(Mutex::new(MockMapState { host, ..Default::default() }));
        let map = MockMap {
            id: MapId(NEXT_MOCK_ID.fetch_add(1, Ordering::Relaxed)),
            state: state.clone(),
        };
        (map, state)
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockMapState) -> R) -> R {
        let mut s = self.state.lock().unwrap();
        f(&mut s)
    }
}

impl MapSurface for MockMap {
    fn id(&self) -> MapId {
        self.id
    }

    fn has_source(&self, id: &str) -> bool {
        self.with(|s| s.sources.iter().any(|x| x == id))
    }

    fn add_source(&mut self, id: &str, spec: SourceSpec) -> Result<(), MapError> {
        self.with(|s| {
            if s.removed {
                return Err(MapError::Removed);
            }
            s.add_source_calls += 1;
            s.ops.push(format!("add_source {}", id));
            if s.sources.iter().any(|x| x == id) {
                return Err(MapError::SourceExists(id.into()));
            }
            s.sources.push(id.into());
            if let SourceSpec::GeoJson { data } = spec {
                if !data.is_empty() {
                    s.source_data.insert(id.into(), data.len());
                }
            }
            Ok(())
        })
    }

    fn set_source_data(&mut self, id: &str, data: FeatureCollection) -> Result<(), MapError> {
        self.with(|s| {
            s.ops.push(format!("set_source_data {}", id));
            if !s.sources.iter().any(|x| x == id) {
                return Err(MapError::SourceMissing(id.into()));
            }
            s.source_data.insert(id.into(), data.len());
            Ok(())
        })
    }

    fn remove_source(&mut self, id: &str) -> Result<(), MapError> {
        self.with(|s| {
            s.remove_source_calls += 1;
            s.ops.push(format!("remove_source {}", id));
            let idx = s
                .sources
                .iter()
                .position(|x| x == id)
                .ok_or_else(|| MapError::SourceMissing(id.into()))?;
            s.sources.remove(idx);
            s.source_data.remove(id);
            Ok(())
        })
    }

    fn has_layer(&self, id: &str) -> bool {
        self.with(|s| s.layers.iter().any(|x| x == id))
    }

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), MapError> {
        self.with(|s| {
            if s.removed {
                return Err(MapError::Removed);
            }
            s.add_layer_calls += 1;
            s.ops.push(format!("add_layer {}", spec.id));
            if s.fail_add_layer_for.contains(&spec.id) {
                return Err(MapError::Backend(format!("injected failure for {}", spec.id)));
            }
            if s.layers.contains(&spec.id) {
                return Err(MapError::LayerExists(spec.id));
            }
            s.visibility.insert(spec.id.clone(), spec.visibility);
            s.layers.push(spec.id);
            Ok(())
        })
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), MapError> {
        self.with(|s| {
            s.remove_layer_calls += 1;
            s.ops.push(format!("remove_layer {}", id));
            if s.fail_remove_layer_for.iter().any(|x| x == id) {
                return Err(MapError::Backend(format!("injected failure for {}", id)));
            }
            let idx = s
                .layers
                .iter()
                .position(|x| x == id)
                .ok_or_else(|| MapError::LayerMissing(id.into()))?;
            s.layers.remove(idx);
            s.visibility.remove(id);
            Ok(())
        })
    }

    fn move_layer(&mut self, id: &str, before: Option<&str>) -> Result<(), MapError> {
        self.with(|s| {
            s.ops.push(format!("move_layer {} before {:?}", id, before));
            let idx = s
                .layers
                .iter()
                .position(|x| x == id)
                .ok_or_else(|| MapError::LayerMissing(id.into()))?;
            let layer = s.layers.remove(idx);
            let at = match before {
                Some(b) => s.layers.iter().position(|x| x == b).unwrap_or(s.layers.len()),
                None => s.layers.len(),
            };
            s.layers.insert(at, layer);
            Ok(())
        })
    }

    fn set_visibility(&mut self, id: &str, visibility: Visibility) -> Result<(), MapError> {
        self.with(|s| {
            s.ops.push(format!("set_visibility {} {:?}", id, visibility));
            if !s.layers.iter().any(|x| x == id) {
                return Err(MapError::LayerMissing(id.into()));
            }
            s.visibility.insert(id.into(), visibility);
            Ok(())
        })
    }

    fn set_padding(&mut self, padding: Padding) {
        self.with(|s| {
            let cam = s.camera.get_or_insert(Camera {
                center: LngLat::new(0.0, 0.0),
                zoom: 1.0,
                padding,
            });
            cam.padding = padding;
        })
    }

    fn jump_to(&mut self, center: LngLat, zoom: f64) {
        self.with(|s| {
            s.jump_calls += 1;
            let padding = s.camera.map(|c| c.padding).unwrap_or_default();
            s.camera = Some(Camera { center, zoom, padding });
        })
    }

    fn fit_bounds(&mut self, bounds: LngLatBounds, _animate: bool) -> Result<(), MapError> {
        self.with(|s| {
            s.fit_calls += 1;
            if s.fail_fit {
                return Err(MapError::FitFailed("injected".into()));
            }
            let padding = s.camera.map(|c| c.padding).unwrap_or_default();
            s.camera = Some(camera_for_bounds(bounds, s.host, padding)?);
            Ok(())
        })
    }

    fn resize(&mut self, host: HostRect) {
        self.with(|s| {
            s.resize_calls += 1;
            s.host = host;
        })
    }

    fn camera(&self) -> Camera {
        self.with(|s| {
            s.camera.unwrap_or(Camera {
                center: LngLat::new(0.0, 0.0),
                zoom: 1.0,
                padding: Padding::zero(),
            })
        })
    }

    fn remove(&mut self) {
        self.with(|s| {
            s.remove_calls += 1;
            s.removed = true;
        })
    }

    fn style_document(&self) -> serde_json::Value {
        self.with(|s| serde_json::json!({ "layers": s.layers }))
    }
}

/// Hands out `MockMap`s and keeps their state for inspection
#[derive(Clone, Default)]
pub struct MockFactory {
    pub maps: Arc<Mutex<Vec<SharedMockState>>>,
    pub fail_fit: bool,
    pub fail_add_layer_for: Vec<String>,
}

impl MockFactory {
    pub fn created(&self) -> usize {
        self.maps.lock().unwrap().len()
    }

    pub fn last(&self) -> SharedMockState {
        self.maps.lock().unwrap().last().cloned().unwrap()
    }
}

impl MapFactory for MockFactory {
    fn create(
        &mut self,
        host: HostRect,
        _options: &MapOptions,
    ) -> Result<Box<dyn MapSurface>, MapError> {
        if !host.is_drawable() {
            return Err(MapError::ZeroSizedSurface(host.width, host.height));
        }
        let (map, state) = MockMap::with_host(host);
        {
            let mut s = state.lock().unwrap();
            s.fail_fit = self.fail_fit;
            s.fail_add_layer_for = self.fail_add_layer_for.clone();
        }
        self.maps.lock().unwrap().push(state);
        Ok(Box::new(map))
    }
}
