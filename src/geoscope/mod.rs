/*
 *  geoscope/mod.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Geoscope: basemap plus togglable live overlays
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

pub mod controller;
pub mod features;
pub mod layers;
pub mod registry;
pub mod style;
pub mod surface;

#[cfg(test)]
pub mod mock;

pub use controller::{
    FitOutcome, HostElement, MapCompositionController, ResizeNotice, ResizeStrategy, safe_fit,
};
pub use features::{Feature, FeatureCollection};
pub use layers::{OverlayLayer, default_layers};
pub use registry::LayerRegistry;
pub use style::{StyleMap, StyleMapFactory, basemap_style};
pub use surface::{HostRect, MapError, MapFactory, MapSurface};
