use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::error::AppError;
use crate::models::ride::{RidePriority, RideRequest, RideStatus};

/// Creation payload shared by the ride endpoints.
#[derive(Debug, Clone)]
pub struct NewRide {
    pub user_id: i64,
    pub pickup_location: String,
    pub drop_location: String,
    pub pickup_lat: f64,
    pub pickup_lon: f64,
    pub drop_lat: f64,
    pub drop_lon: f64,
    pub priority: RidePriority,
}

/// The ride data store. Records are never deleted; status only moves forward
/// through the lifecycle.
pub struct RideStore {
    rides: DashMap<i64, RideRequest>,
    next_id: AtomicI64,
}

impl Default for RideStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RideStore {
    pub fn new() -> Self {
        Self {
            rides: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn create(&self, new: NewRide, status: RideStatus) -> Result<RideRequest, AppError> {
        if new.pickup_location.trim().is_empty() || new.drop_location.trim().is_empty() {
            return Err(AppError::Validation(
                "pickup_location and drop_location cannot be empty".to_string(),
            ));
        }
        validate_point("pickup", new.pickup_lat, new.pickup_lon)?;
        validate_point("drop", new.drop_lat, new.drop_lon)?;

        let ride = RideRequest {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            user_id: new.user_id,
            pickup_location: new.pickup_location.trim().to_string(),
            drop_location: new.drop_location.trim().to_string(),
            pickup_lat: new.pickup_lat,
            pickup_lon: new.pickup_lon,
            drop_lat: new.drop_lat,
            drop_lon: new.drop_lon,
            priority: new.priority,
            status,
            assigned_driver_id: None,
            created_at: Utc::now(),
        };

        self.rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    pub fn get(&self, ride_id: i64) -> Result<RideRequest, AppError> {
        self.rides
            .get(&ride_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))
    }

    pub fn by_user(&self, user_id: i64) -> Vec<RideRequest> {
        let mut rides: Vec<RideRequest> = self
            .rides
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        rides.sort_by_key(|r| r.id);
        rides
    }

    /// queued -> assigned, recording the winning driver in the same update.
    pub fn assign(&self, ride_id: i64, driver_id: i64) -> Result<RideRequest, AppError> {
        let mut ride = self
            .rides
            .get_mut(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

        if !ride.status.can_transition_to(RideStatus::Assigned) {
            return Err(AppError::Conflict(format!(
                "ride {ride_id} cannot be assigned from its current state"
            )));
        }

        ride.status = RideStatus::Assigned;
        ride.assigned_driver_id = Some(driver_id);
        Ok(ride.clone())
    }

    pub fn complete(&self, ride_id: i64) -> Result<RideRequest, AppError> {
        let mut ride = self
            .rides
            .get_mut(&ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))?;

        if !ride.status.can_transition_to(RideStatus::Completed) {
            return Err(AppError::Conflict(format!(
                "ride {ride_id} cannot be completed from its current state"
            )));
        }

        ride.status = RideStatus::Completed;
        Ok(ride.clone())
    }
}

fn validate_point(label: &str, lat: f64, lon: f64) -> Result<(), AppError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::Validation(format!(
            "{label} latitude {lat} out of range [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(AppError::Validation(format!(
            "{label} longitude {lon} out of range [-180, 180]"
        )));
    }
    Ok(())
}
