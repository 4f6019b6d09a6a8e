use std::sync::{Arc, Mutex};

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;

use crate::engine::queue::RideQueue;
use crate::engine::registry::DriverRegistry;
use crate::engine::rides::RideStore;
use crate::error::AppError;
use crate::geo::{eta_minutes, haversine_km, round_to};
use crate::models::assignment::Assignment;
use crate::models::driver::DriverStatus;

/// Pairs the head of the ride queue with the nearest available driver.
///
/// Every matching decision runs under a single dispatch lock, so two
/// concurrent `assign_next` calls can never select the same driver or
/// dequeue the same ride twice.
pub struct DispatchMatcher {
    registry: Arc<DriverRegistry>,
    queue: Arc<RideQueue>,
    rides: Arc<RideStore>,
    avg_speed_kmph: f64,
    dispatch_lock: Mutex<()>,
    // driver_id -> ride_id for assignments in flight, consumed by complete_ride.
    active: DashMap<i64, i64>,
}

impl DispatchMatcher {
    pub fn new(
        registry: Arc<DriverRegistry>,
        queue: Arc<RideQueue>,
        rides: Arc<RideStore>,
        avg_speed_kmph: f64,
    ) -> Self {
        Self {
            registry,
            queue,
            rides,
            avg_speed_kmph,
            dispatch_lock: Mutex::new(()),
            active: DashMap::new(),
        }
    }

    /// Greedy nearest-driver assignment for the oldest queued ride.
    ///
    /// Distance is great-circle kilometers from the driver's last known
    /// location to the pickup; ties break on the lowest driver id. The
    /// returned distance is rounded to 2 decimals and the ETA to 1.
    pub fn assign_next(&self) -> Result<Assignment, AppError> {
        let _guard = self.dispatch_lock.lock().expect("dispatch lock poisoned");

        let ride_id = self.queue.peek_head().ok_or(AppError::EmptyQueue)?;
        let ride = self.rides.get(ride_id)?;
        let pickup = ride.pickup_point();

        let mut candidates: Vec<(f64, i64)> = self
            .registry
            .available_with_location()
            .into_iter()
            .filter_map(|driver| {
                driver
                    .location
                    .map(|loc| (haversine_km(&loc.point(), &pickup), driver.id))
            })
            .collect();

        if candidates.is_empty() {
            return Err(AppError::NoDriver);
        }

        // Minimum distance first, lowest id on ties.
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        // A candidate may have gone busy or offline since the snapshot;
        // skip it and fall through to the next-nearest.
        let (distance_km, driver_id) = candidates
            .into_iter()
            .find(|(_, id)| self.registry.try_mark_busy(*id))
            .ok_or(AppError::NoDriver)?;

        if let Err(err) = self
            .queue
            .dequeue(ride_id)
            .and_then(|()| self.rides.assign(ride_id, driver_id).map(|_| ()))
        {
            // Only this critical section dequeues, so neither call can fail
            // while the lock is held; hand the driver back if it ever does.
            let _ = self.registry.set_status(driver_id, DriverStatus::Available);
            return Err(AppError::Internal(format!(
                "assignment of ride {ride_id} could not be recorded: {err}"
            )));
        }

        self.active.insert(driver_id, ride_id);

        let assignment = Assignment {
            ride_id,
            driver_id,
            distance_km: round_to(distance_km, 2),
            eta_minutes: round_to(eta_minutes(distance_km, self.avg_speed_kmph), 1),
            assigned_at: Utc::now(),
        };

        info!(
            ride_id,
            driver_id,
            distance_km = assignment.distance_km,
            eta_minutes = assignment.eta_minutes,
            "ride assigned"
        );

        Ok(assignment)
    }

    /// Marks the driver's active ride completed and the driver available
    /// again. Returns the completed ride id so the caller can release any
    /// container tied to it.
    pub fn complete_ride(&self, driver_id: i64) -> Result<i64, AppError> {
        let _guard = self.dispatch_lock.lock().expect("dispatch lock poisoned");

        let driver = self.registry.get(driver_id)?;
        if driver.status != DriverStatus::Busy {
            return Err(AppError::NotFound(format!(
                "driver {driver_id} has no active ride"
            )));
        }

        let (_, ride_id) = self.active.remove(&driver_id).ok_or_else(|| {
            AppError::NotFound(format!("driver {driver_id} has no active ride"))
        })?;

        self.rides.complete(ride_id)?;
        self.registry
            .set_status(driver_id, DriverStatus::Available)?;

        info!(ride_id, driver_id, "ride completed");

        Ok(ride_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::DispatchMatcher;
    use crate::engine::queue::RideQueue;
    use crate::engine::registry::DriverRegistry;
    use crate::engine::rides::{NewRide, RideStore};
    use crate::error::AppError;
    use crate::models::driver::{DriverSpec, DriverStatus};
    use crate::models::ride::{RidePriority, RideStatus};

    fn matcher() -> (
        DispatchMatcher,
        Arc<DriverRegistry>,
        Arc<RideQueue>,
        Arc<RideStore>,
    ) {
        let registry = Arc::new(DriverRegistry::new());
        let queue = Arc::new(RideQueue::new());
        let rides = Arc::new(RideStore::new());
        let matcher = DispatchMatcher::new(
            registry.clone(),
            queue.clone(),
            rides.clone(),
            30.0,
        );
        (matcher, registry, queue, rides)
    }

    fn driver(registry: &DriverRegistry, name: &str, lat: f64, lon: f64) -> i64 {
        let driver = registry
            .register(DriverSpec {
                name: name.to_string(),
                car_no: format!("KA-{name}"),
                status: None,
            })
            .unwrap();
        registry.update_location(driver.id, lat, lon).unwrap();
        driver.id
    }

    fn queued_ride(
        rides: &RideStore,
        queue: &RideQueue,
        pickup_lat: f64,
        pickup_lon: f64,
    ) -> i64 {
        let ride = rides
            .create(
                NewRide {
                    user_id: 1,
                    pickup_location: "pickup".to_string(),
                    drop_location: "drop".to_string(),
                    pickup_lat,
                    pickup_lon,
                    drop_lat: pickup_lat + 0.1,
                    drop_lon: pickup_lon + 0.1,
                    priority: RidePriority::Normal,
                },
                RideStatus::Queued,
            )
            .unwrap();
        queue.enqueue(ride.id).unwrap();
        ride.id
    }

    #[test]
    fn empty_queue_fails_fast_without_mutation() {
        let (matcher, registry, _queue, _rides) = matcher();
        driver(&registry, "Asha", 12.97, 77.59);

        assert!(matches!(matcher.assign_next(), Err(AppError::EmptyQueue)));
        assert_eq!(registry.list_available().len(), 1);
    }

    #[test]
    fn no_locatable_driver_leaves_ride_queued() {
        let (matcher, registry, queue, rides) = matcher();
        // Registered but never reported a location.
        registry
            .register(DriverSpec {
                name: "Asha".to_string(),
                car_no: "KA-01".to_string(),
                status: None,
            })
            .unwrap();
        queued_ride(&rides, &queue, 12.97, 77.59);

        assert!(matches!(matcher.assign_next(), Err(AppError::NoDriver)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn nearest_driver_wins() {
        let (matcher, registry, queue, rides) = matcher();
        let far = driver(&registry, "Far", 13.5, 78.5);
        let near = driver(&registry, "Near", 12.98, 77.60);
        let ride_id = queued_ride(&rides, &queue, 12.97, 77.59);

        let assignment = matcher.assign_next().unwrap();
        assert_eq!(assignment.driver_id, near);
        assert_eq!(assignment.ride_id, ride_id);

        assert_eq!(queue.len(), 0);
        assert_eq!(
            registry.get(near).unwrap().status,
            DriverStatus::Busy
        );
        assert_eq!(
            registry.get(far).unwrap().status,
            DriverStatus::Available
        );

        let ride = rides.get(ride_id).unwrap();
        assert_eq!(ride.status, RideStatus::Assigned);
        assert_eq!(ride.assigned_driver_id, Some(near));
    }

    #[test]
    fn head_ride_is_served_even_if_second_is_closer() {
        let (matcher, registry, queue, rides) = matcher();
        let d = driver(&registry, "Asha", 12.98, 77.60);
        let oldest = queued_ride(&rides, &queue, 12.97, 77.59);
        let nearer_but_newer = queued_ride(&rides, &queue, 12.9801, 77.6001);

        let assignment = matcher.assign_next().unwrap();
        assert_eq!(assignment.ride_id, oldest);
        assert_eq!(assignment.driver_id, d);

        // The newer ride stays queued at the head.
        assert_eq!(queue.peek_head(), Some(nearer_but_newer));
    }

    #[test]
    fn ties_break_on_lowest_driver_id() {
        let (matcher, registry, queue, rides) = matcher();
        let first = driver(&registry, "A", 12.98, 77.60);
        let _second = driver(&registry, "B", 12.98, 77.60);
        queued_ride(&rides, &queue, 12.97, 77.59);

        let assignment = matcher.assign_next().unwrap();
        assert_eq!(assignment.driver_id, first);
    }

    #[test]
    fn colocated_driver_gets_zero_distance_and_eta() {
        let (matcher, registry, queue, rides) = matcher();
        driver(&registry, "Asha", 12.9716, 77.5946);
        queued_ride(&rides, &queue, 12.9716, 77.5946);

        let assignment = matcher.assign_next().unwrap();
        assert_eq!(assignment.distance_km, 0.0);
        assert_eq!(assignment.eta_minutes, 0.0);
    }

    #[test]
    fn complete_ride_frees_the_driver() {
        let (matcher, registry, queue, rides) = matcher();
        let d = driver(&registry, "Asha", 12.98, 77.60);
        let ride_id = queued_ride(&rides, &queue, 12.97, 77.59);

        matcher.assign_next().unwrap();
        let completed = matcher.complete_ride(d).unwrap();

        assert_eq!(completed, ride_id);
        assert_eq!(rides.get(ride_id).unwrap().status, RideStatus::Completed);
        assert_eq!(
            registry.get(d).unwrap().status,
            DriverStatus::Available
        );

        // A second completion finds nothing active.
        assert!(matches!(
            matcher.complete_ride(d),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn complete_ride_unknown_or_idle_driver_is_not_found() {
        let (matcher, registry, _queue, _rides) = matcher();
        let idle = driver(&registry, "Asha", 12.98, 77.60);

        assert!(matches!(
            matcher.complete_ride(999),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            matcher.complete_ride(idle),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn concurrent_assignment_never_double_books() {
        let (matcher, registry, queue, rides) = matcher();
        for i in 0..4 {
            driver(&registry, &format!("D{i}"), 12.97 + i as f64 * 0.01, 77.59);
        }
        for _ in 0..4 {
            queued_ride(&rides, &queue, 12.97, 77.59);
        }

        let matcher = Arc::new(matcher);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let matcher = matcher.clone();
                std::thread::spawn(move || matcher.assign_next().unwrap())
            })
            .collect();

        let mut driver_ids: Vec<i64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().driver_id)
            .collect();
        driver_ids.sort_unstable();
        driver_ids.dedup();

        assert_eq!(driver_ids.len(), 4, "a driver was double-booked");
        assert_eq!(queue.len(), 0);
        assert!(registry.list_available().is_empty());
    }
}
