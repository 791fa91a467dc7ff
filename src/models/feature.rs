//! GeoJSON feature payloads for the two map datasets.
//!
//! These types mirror the shape of the published `fonavi.geojson` and
//! `calles.geojson` assets. Property names stay in Spanish because that is
//! what the data files carry.

use serde::{Deserialize, Serialize};

/// A FONAVI building, published as a GeoJSON point feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: BuildingProperties,
    pub geometry: PointGeometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingProperties {
    pub tipo: String,
    pub nombre: i64,
    pub plan: String,
    pub id: i64,
}

impl BuildingFeature {
    /// Label shown in marker popups, e.g. "Edificio 12".
    pub fn display_label(&self) -> String {
        format!("{} {}", self.properties.tipo, self.properties.nombre)
    }
}

/// A street, published as a GeoJSON line feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: StreetProperties,
    pub geometry: LineGeometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetProperties {
    pub nombre: String,
    pub tipo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    /// Always "Point" in the published data.
    #[serde(rename = "type")]
    pub kind: String,
    /// Longitude, latitude.
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGeometry {
    /// "LineString" or "MultiLineString".
    #[serde(rename = "type")]
    pub kind: String,
    /// Nesting depth depends on the geometry kind, so this stays untyped.
    pub coordinates: serde_json::Value,
}
