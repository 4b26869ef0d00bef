/*
 *  geoscope/features.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  GeoJSON shaped feature collections fed to the overlay sources
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
use serde_json::{Map, Value};

/// Geometry subset used by the overlays (points, tracks, areas)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn point(lng: f64, lat: f64) -> Self {
        Self {
            geometry: Geometry::Point { coordinates: [lng, lat] },
            properties: Map::new(),
        }
    }

    pub fn line(coordinates: Vec<[f64; 2]>) -> Self {
        Self {
            geometry: Geometry::LineString { coordinates },
            properties: Map::new(),
        }
    }

    pub fn polygon(ring: Vec<[f64; 2]>) -> Self {
        Self {
            geometry: Geometry::Polygon { coordinates: vec![ring] },
            properties: Map::new(),
        }
    }

    /// Attach a property, builder style
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Data payload of a GeoJSON source; the empty collection is what every
/// overlay source starts with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self { features: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_collection_shape() {
        let fc = FeatureCollection::empty();
        assert_eq!(
            serde_json::to_value(&fc).unwrap(),
            json!({ "type": "FeatureCollection", "features": [] })
        );
    }

    #[test]
    fn test_parse_upstream_aircraft() {
        let raw = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [-3.7, 40.4] },
                  "properties": { "callsign": "IBE123" } },
                { "type": "Feature",
                  "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] } }
            ]
        });
        let fc: FeatureCollection = serde_json::from_value(raw).unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.features[0].properties["callsign"], "IBE123");
        assert!(fc.features[1].properties.is_empty());
    }
}
