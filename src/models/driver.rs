use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    Available,
    Busy,
    Offline,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriverLocation {
    pub lat: f64,
    pub lon: f64,
    pub updated_at: DateTime<Utc>,
}

impl DriverLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: i64,
    pub name: String,
    pub car_no: String,
    pub status: DriverStatus,
    pub location: Option<DriverLocation>,
}

/// Registration payload, shared by single and bulk registration.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverSpec {
    pub name: String,
    pub car_no: String,
    #[serde(default)]
    pub status: Option<DriverStatus>,
}
