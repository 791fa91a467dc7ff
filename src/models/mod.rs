//! Data models for the map datasets.
//!
//! - `BuildingFeature`: FONAVI buildings (point features)
//! - `StreetFeature`: city streets (line features)

pub mod feature;

pub use feature::{
    BuildingFeature, BuildingProperties, LineGeometry, PointGeometry, StreetFeature,
    StreetProperties,
};
