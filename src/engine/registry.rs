use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::error::AppError;
use crate::models::driver::{Driver, DriverLocation, DriverSpec, DriverStatus};

/// Owns driver records and their live location/status. Reads clone whole
/// records under the entry lock, so a concurrent caller never observes a
/// partially-updated driver.
pub struct DriverRegistry {
    drivers: DashMap<i64, Driver>,
    next_id: AtomicI64,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn register(&self, spec: DriverSpec) -> Result<Driver, AppError> {
        validate_spec(&spec)?;

        let driver = Driver {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: spec.name.trim().to_string(),
            car_no: spec.car_no.trim().to_string(),
            status: spec.status.unwrap_or(DriverStatus::Available),
            location: None,
        };

        self.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    /// All-or-nothing: every spec is validated before the first insert, so a
    /// bad element registers nobody.
    pub fn register_bulk(&self, specs: Vec<DriverSpec>) -> Result<Vec<Driver>, AppError> {
        if specs.is_empty() {
            return Err(AppError::Validation(
                "drivers list cannot be empty".to_string(),
            ));
        }

        for spec in &specs {
            validate_spec(spec)?;
        }

        let registered = specs
            .into_iter()
            .map(|spec| {
                let driver = Driver {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    name: spec.name.trim().to_string(),
                    car_no: spec.car_no.trim().to_string(),
                    status: spec.status.unwrap_or(DriverStatus::Available),
                    location: None,
                };
                self.drivers.insert(driver.id, driver.clone());
                driver
            })
            .collect();

        Ok(registered)
    }

    pub fn update_location(&self, driver_id: i64, lat: f64, lon: f64) -> Result<(), AppError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Validation(format!(
                "latitude {lat} out of range [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::Validation(format!(
                "longitude {lon} out of range [-180, 180]"
            )));
        }

        let mut driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        driver.location = Some(DriverLocation {
            lat,
            lon,
            updated_at: Utc::now(),
        });

        Ok(())
    }

    pub fn set_status(&self, driver_id: i64, status: DriverStatus) -> Result<(), AppError> {
        let mut driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        driver.status = status;
        Ok(())
    }

    /// Atomically flip available -> busy. Returns false if the driver is
    /// gone or no longer available, letting the matcher skip candidates
    /// whose status changed after the snapshot was taken.
    pub fn try_mark_busy(&self, driver_id: i64) -> bool {
        match self.drivers.get_mut(&driver_id) {
            Some(mut driver) if driver.status == DriverStatus::Available => {
                driver.status = DriverStatus::Busy;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, driver_id: i64) -> Result<Driver, AppError> {
        self.drivers
            .get(&driver_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))
    }

    pub fn list(&self) -> Vec<Driver> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by_key(|d| d.id);
        drivers
    }

    pub fn list_available(&self) -> Vec<Driver> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .filter(|entry| entry.value().status == DriverStatus::Available)
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by_key(|d| d.id);
        drivers
    }

    /// Available drivers that have reported a location, i.e. the matcher's
    /// candidate set.
    pub fn available_with_location(&self) -> Vec<Driver> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .filter(|entry| {
                let driver = entry.value();
                driver.status == DriverStatus::Available && driver.location.is_some()
            })
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by_key(|d| d.id);
        drivers
    }
}

fn validate_spec(spec: &DriverSpec) -> Result<(), AppError> {
    if spec.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if spec.car_no.trim().is_empty() {
        return Err(AppError::Validation("car_no cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::DriverRegistry;
    use crate::error::AppError;
    use crate::models::driver::{DriverSpec, DriverStatus};

    fn spec(name: &str, car_no: &str) -> DriverSpec {
        DriverSpec {
            name: name.to_string(),
            car_no: car_no.to_string(),
            status: None,
        }
    }

    #[test]
    fn ids_are_unique_and_monotonic() {
        let registry = DriverRegistry::new();
        let a = registry.register(spec("Asha", "KA-01-1234")).unwrap();
        let b = registry.register(spec("Ravi", "KA-02-9999")).unwrap();

        assert!(b.id > a.id);
        assert_eq!(a.status, DriverStatus::Available);
        assert!(a.location.is_none());
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = DriverRegistry::new();
        let err = registry.register(spec("  ", "KA-01-1234")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn bulk_is_all_or_nothing() {
        let registry = DriverRegistry::new();
        let err = registry
            .register_bulk(vec![spec("Asha", "KA-01-1234"), spec("", "KA-02-9999")])
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn bulk_registers_in_order() {
        let registry = DriverRegistry::new();
        let drivers = registry
            .register_bulk(vec![spec("Asha", "KA-01-1234"), spec("Ravi", "KA-02-9999")])
            .unwrap();

        assert_eq!(drivers.len(), 2);
        assert_eq!(drivers[0].name, "Asha");
        assert!(drivers[0].id < drivers[1].id);
    }

    #[test]
    fn bulk_empty_list_is_rejected() {
        let registry = DriverRegistry::new();
        assert!(matches!(
            registry.register_bulk(vec![]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn location_bounds_are_enforced() {
        let registry = DriverRegistry::new();
        let driver = registry.register(spec("Asha", "KA-01-1234")).unwrap();

        assert!(matches!(
            registry.update_location(driver.id, 91.0, 0.0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            registry.update_location(driver.id, 0.0, -181.0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            registry.update_location(9999, 0.0, 0.0),
            Err(AppError::NotFound(_))
        ));

        registry
            .update_location(driver.id, 12.9716, 77.5946)
            .unwrap();
        let updated = registry.get(driver.id).unwrap();
        let location = updated.location.unwrap();
        assert_eq!(location.lat, 12.9716);
        assert_eq!(location.lon, 77.5946);
    }

    #[test]
    fn try_mark_busy_flips_only_available_drivers() {
        let registry = DriverRegistry::new();
        let driver = registry.register(spec("Asha", "KA-01-1234")).unwrap();

        assert!(registry.try_mark_busy(driver.id));
        assert!(!registry.try_mark_busy(driver.id));
        assert_eq!(registry.get(driver.id).unwrap().status, DriverStatus::Busy);
        assert!(!registry.try_mark_busy(404));
    }

    #[test]
    fn candidate_set_requires_location() {
        let registry = DriverRegistry::new();
        let located = registry.register(spec("Asha", "KA-01-1234")).unwrap();
        registry.register(spec("Ravi", "KA-02-9999")).unwrap();
        registry
            .update_location(located.id, 12.9716, 77.5946)
            .unwrap();

        assert_eq!(registry.list_available().len(), 2);
        let candidates = registry.available_with_location();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, located.id);
    }
}
