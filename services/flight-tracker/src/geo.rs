//! Great-circle distance on a spherical Earth

/// Mean Earth radius in kilometres
pub const DEFAULT_EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Haversine distance between two points, in the unit of `radius`
pub fn haversine_km(from: Coordinate, to: Coordinate, radius: f64) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1 for near-antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    radius * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // London Heathrow to Paris Charles de Gaulle, roughly 348 km
        let lhr = Coordinate::new(51.4700, -0.4543);
        let cdg = Coordinate::new(49.0097, 2.5479);

        let distance = haversine_km(lhr, cdg, DEFAULT_EARTH_RADIUS_KM);
        assert!(distance > 340.0 && distance < 355.0, "got {}", distance);
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        let p = Coordinate::new(47.4502, -122.3088);
        assert_eq!(haversine_km(p, p, DEFAULT_EARTH_RADIUS_KM), 0.0);
    }

    #[test]
    fn test_haversine_symmetric_and_scales_with_radius() {
        let a = Coordinate::new(10.0, 20.0);
        let b = Coordinate::new(-5.0, 30.0);

        let ab = haversine_km(a, b, DEFAULT_EARTH_RADIUS_KM);
        let ba = haversine_km(b, a, DEFAULT_EARTH_RADIUS_KM);
        assert!((ab - ba).abs() < 1e-9);

        let doubled = haversine_km(a, b, DEFAULT_EARTH_RADIUS_KM * 2.0);
        assert!((doubled - 2.0 * ab).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_near_antipodal_stays_finite() {
        let half_circumference = std::f64::consts::PI * DEFAULT_EARTH_RADIUS_KM;

        for (lat, lon) in [(0.0, 0.0), (45.0, 10.0), (-33.9, 151.2), (89.999999, 0.0)] {
            let from = Coordinate::new(lat, lon);
            let to = Coordinate::new(-lat, lon + 180.0);
            let distance = haversine_km(from, to, DEFAULT_EARTH_RADIUS_KM);
            assert!(distance.is_finite(), "NaN for ({}, {})", lat, lon);
            assert!((distance - half_circumference).abs() < 1.0, "got {}", distance);
        }
    }
}
