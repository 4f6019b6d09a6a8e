use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Requested,
    Queued,
    Assigned,
    Completed,
}

impl RideStatus {
    /// Lifecycle: requested -> queued -> assigned -> completed, no reversals.
    /// A ride created directly into the queue enters at `Queued`.
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        matches!(
            (self, next),
            (RideStatus::Requested, RideStatus::Queued)
                | (RideStatus::Queued, RideStatus::Assigned)
                | (RideStatus::Assigned, RideStatus::Completed)
        )
    }
}

/// Emergency rides get larger resource grants on their container; queue
/// ordering is unaffected either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RidePriority {
    Normal,
    Emergency,
}

impl Default for RidePriority {
    fn default() -> Self {
        RidePriority::Normal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: i64,
    pub user_id: i64,
    pub pickup_location: String,
    pub drop_location: String,
    pub pickup_lat: f64,
    pub pickup_lon: f64,
    pub drop_lat: f64,
    pub drop_lon: f64,
    pub priority: RidePriority,
    pub status: RideStatus,
    pub assigned_driver_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl RideRequest {
    pub fn pickup_point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.pickup_lat,
            lon: self.pickup_lon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RideStatus;

    #[test]
    fn lifecycle_moves_forward_only() {
        assert!(RideStatus::Requested.can_transition_to(RideStatus::Queued));
        assert!(RideStatus::Queued.can_transition_to(RideStatus::Assigned));
        assert!(RideStatus::Assigned.can_transition_to(RideStatus::Completed));

        assert!(!RideStatus::Queued.can_transition_to(RideStatus::Requested));
        assert!(!RideStatus::Assigned.can_transition_to(RideStatus::Queued));
        assert!(!RideStatus::Completed.can_transition_to(RideStatus::Assigned));
        assert!(!RideStatus::Requested.can_transition_to(RideStatus::Completed));
    }
}
