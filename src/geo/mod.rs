use crate::models::driver::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lon = (delta_lon / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lon * sin_lon;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Minutes to cover `distance_km` at the assumed average speed.
pub fn eta_minutes(distance_km: f64, avg_speed_kmph: f64) -> f64 {
    distance_km / avg_speed_kmph * 60.0
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::{eta_minutes, haversine_km, round_to};
    use crate::models::driver::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 12.9716,
            lon: 77.5946,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint {
            lat: 12.9716,
            lon: 77.5946,
        };
        let b = GeoPoint {
            lat: 13.0827,
            lon: 80.2707,
        };
        let ab = haversine_km(&a, &b);
        let ba = haversine_km(&b, &a);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lon: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lon: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn eta_at_thirty_kmph() {
        // 15 km at 30 km/h is half an hour.
        assert!((eta_minutes(15.0, 30.0) - 30.0).abs() < 1e-9);
        assert_eq!(eta_minutes(0.0, 30.0), 0.0);
    }

    #[test]
    fn rounding_matches_wire_precision() {
        assert_eq!(round_to(2.345678, 2), 2.35);
        assert_eq!(round_to(4.64999, 1), 4.6);
    }
}
