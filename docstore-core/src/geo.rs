// docstore-core/src/geo.rs
//! Geodesy for `$nearSphere`
//!
//! Distances are reported in kilometers. `$maxDistance` arrives in meters and
//! is converted by the query layer before comparing.

use serde_json::Value;
use std::fmt::Debug;

/// Earth's mean radius in kilometers (WGS84)
const EARTH_RADIUS_KM: f64 = 6_371.008_8;

/// A longitude/latitude pair in degrees (GeoJSON axis order)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        GeoPoint {
            longitude,
            latitude,
        }
    }

    /// Parse a `[lng, lat]` coordinate pair
    pub fn from_coordinates(value: &Value) -> Option<Self> {
        let pair = value.as_array()?;
        if pair.len() < 2 {
            return None;
        }
        Some(GeoPoint::new(pair[0].as_f64()?, pair[1].as_f64()?))
    }
}

/// Great-circle distance provider
pub trait Geodesy: Send + Sync + Debug {
    /// Distance between two points in kilometers
    fn distance(&self, a: &GeoPoint, b: &GeoPoint) -> f64;
}

/// Haversine formula on a spherical Earth
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl Geodesy for Haversine {
    fn distance(&self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        let lat1_rad = a.latitude.to_radians();
        let lat2_rad = b.latitude.to_radians();
        let delta_lat = (b.latitude - a.latitude).to_radians();
        let delta_lon = (b.longitude - a.longitude).to_radians();

        let h = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * h.sqrt().asin();

        EARTH_RADIUS_KM * c
    }
}

/// Stored geometry a `$nearSphere` predicate can be evaluated against
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(GeoPoint),
    MultiPoint(Vec<GeoPoint>),
}

impl Geometry {
    /// Read a GeoJSON `Point` / `MultiPoint`, or a legacy `[lng, lat]` pair
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(point) = GeoPoint::from_coordinates(value) {
            return Some(Geometry::Point(point));
        }

        let obj = value.as_object()?;
        let coordinates = obj.get("coordinates")?;
        match obj.get("type")?.as_str()? {
            "Point" => GeoPoint::from_coordinates(coordinates).map(Geometry::Point),
            "MultiPoint" => coordinates
                .as_array()?
                .iter()
                .map(GeoPoint::from_coordinates)
                .collect::<Option<Vec<_>>>()
                .map(Geometry::MultiPoint),
            _ => None,
        }
    }

    /// Points of this geometry
    pub fn points(&self) -> &[GeoPoint] {
        match self {
            Geometry::Point(point) => std::slice::from_ref(point),
            Geometry::MultiPoint(points) => points,
        }
    }
}
