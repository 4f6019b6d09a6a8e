use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub ride_id: i64,
    pub driver_id: i64,
    pub distance_km: f64,
    pub eta_minutes: f64,
    pub assigned_at: DateTime<Utc>,
}
