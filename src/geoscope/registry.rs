/*
 *  geoscope/registry.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Ordered overlay collection bound to one map instance
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
use super::layers::OverlayLayer;
use super::surface::{MapError, MapId, MapSurface};

/// Owns the overlays of exactly one map, kept sorted by z rank.
///
/// `destroy` consumes the registry, so nothing can be called on it
/// afterwards; a recreated map gets a fresh registry.
pub struct LayerRegistry {
    map_id: MapId,
    layers: Vec<Box<dyn OverlayLayer>>,
}

impl LayerRegistry {
    pub fn new(map: &dyn MapSurface) -> Self {
        Self { map_id: map.id(), layers: Vec::new() }
    }

    pub fn map_id(&self) -> MapId {
        self.map_id
    }

    fn check_map(&self, map: &dyn MapSurface) -> Result<(), MapError> {
        if map.id() != self.map_id {
            return Err(MapError::ForeignMap { bound: self.map_id, given: map.id() });
        }
        Ok(())
    }

    /// Insert by z rank (stable for equal ranks) then attach.
    ///
    /// The layer stays in the sequence even when its attach fails, so a
    /// later `destroy` still gets to clean whatever it left behind.
    pub fn add(
        &mut self,
        map: &mut dyn MapSurface,
        layer: Box<dyn OverlayLayer>,
    ) -> Result<(), MapError> {
        self.check_map(map)?;
        let z = layer.z_index();
        let at = self.layers.partition_point(|l| l.z_index() <= z);
        self.layers.insert(at, layer);
        self.layers[at].attach(map)?;

        // restack under the next higher overlay already on the map
        let above = self.layers[at + 1..]
            .iter()
            .find(|l| l.is_attached() && map.has_layer(l.id()))
            .map(|l| l.id().to_string());
        if let Some(above) = above {
            let id = self.layers[at].id().to_string();
            map.move_layer(&id, Some(&above))?;
        }
        debug!("layer {} (z {}) registered at {}", self.layers[at].id(), z, at);
        Ok(())
    }

    /// Toggle every layer carrying `id`; `Ok(false)` when none matched.
    pub fn set_enabled(
        &mut self,
        map: &mut dyn MapSurface,
        id: &str,
        on: bool,
    ) -> Result<bool, MapError> {
        self.check_map(map)?;
        let mut found = false;
        for layer in self.layers.iter_mut().filter(|l| l.id() == id) {
            layer.set_enabled(map, on)?;
            found = true;
        }
        Ok(found)
    }

    pub fn set_features(
        &mut self,
        map: &mut dyn MapSurface,
        id: &str,
        data: FeatureCollection,
    ) -> Result<bool, MapError> {
        self.check_map(map)?;
        let mut found = false;
        for layer in self.layers.iter_mut().filter(|l| l.id() == id) {
            layer.set_features(map, data.clone())?;
            found = true;
        }
        Ok(found)
    }

    /// Ids in draw order, lowest first
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id()).collect()
    }

    pub fn is_enabled(&self, id: &str) -> Option<bool> {
        self.layers.iter().find(|l| l.id() == id).map(|l| l.is_enabled())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Detach and release every layer; individual failures are logged only.
    pub fn destroy(mut self, map: &mut dyn MapSurface) {
        for mut layer in self.layers.drain(..) {
            if let Err(e) = layer.detach(map) {
                warn!("failed to clean layer {}: {}", layer.id(), e);
            }
            layer.destroy();
        }
        debug!("layer registry for {} destroyed", self.map_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoscope::layers::{
        AircraftLayer, CyclonesLayer, LightningLayer, ShipsLayer, WeatherLayer, default_layers,
    };
    use crate::geoscope::mock::MockMap;
    use crate::geoscope::surface::Visibility;

    #[test]
    fn test_sorted_regardless_of_insertion() {
        let (mut map, state) = MockMap::new();
        let mut reg = LayerRegistry::new(&map);
        reg.add(&mut map, Box::new(LightningLayer::default())).unwrap();
        reg.add(&mut map, Box::new(WeatherLayer::default())).unwrap();
        reg.add(&mut map, Box::new(ShipsLayer::default())).unwrap();

        let expected = vec!["geoscope-weather", "geoscope-ships", "geoscope-lightning"];
        assert_eq!(reg.layer_ids(), expected);
        // map draw order follows the registry
        assert_eq!(state.lock().unwrap().layers, expected);
    }

    #[test]
    fn test_failure_does_not_block_others() {
        let (mut map, state) = MockMap::new();
        state.lock().unwrap().fail_add_layer_for.push("geoscope-ships".into());
        let mut reg = LayerRegistry::new(&map);

        let mut failures = 0;
        for layer in default_layers() {
            if reg.add(&mut map, layer).is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
        assert_eq!(reg.len(), 5);
        assert_eq!(
            state.lock().unwrap().layers,
            vec!["geoscope-weather", "geoscope-cyclones", "geoscope-aircraft", "geoscope-lightning"]
        );
    }

    #[test]
    fn test_destroy_swallows_errors_and_clears() {
        let (mut map, state) = MockMap::new();
        let mut reg = LayerRegistry::new(&map);
        reg.add(&mut map, Box::new(CyclonesLayer::default())).unwrap();
        reg.add(&mut map, Box::new(AircraftLayer::default())).unwrap();
        state.lock().unwrap().fail_remove_layer_for.push("geoscope-cyclones".into());

        reg.destroy(&mut map);

        let s = state.lock().unwrap();
        assert_eq!(s.layers, vec!["geoscope-cyclones"]);
        assert!(!s.layers.contains(&"geoscope-aircraft".to_string()));
        assert!(!s.sources.contains(&"geoscope-aircraft-source".to_string()));
    }

    #[test]
    fn test_set_enabled_by_id() {
        let (mut map, state) = MockMap::new();
        let mut reg = LayerRegistry::new(&map);
        reg.add(&mut map, Box::new(AircraftLayer::default())).unwrap();

        assert!(reg.set_enabled(&mut map, "geoscope-aircraft", true).unwrap());
        assert!(!reg.set_enabled(&mut map, "geoscope-nothing", true).unwrap());
        assert_eq!(reg.is_enabled("geoscope-aircraft"), Some(true));
        assert_eq!(state.lock().unwrap().visibility["geoscope-aircraft"], Visibility::Visible);
    }

    #[test]
    fn test_foreign_map_rejected() {
        let (first, _) = MockMap::new();
        let (mut second, _) = MockMap::new();
        let mut reg = LayerRegistry::new(&first);
        let res = reg.add(&mut second, Box::new(ShipsLayer::default()));
        assert!(matches!(res, Err(MapError::ForeignMap { .. })));
        assert!(reg.is_empty());
    }
}
