//! Great-circle distance and heading helpers
//!
//! Distances are computed on a sphere with the mean Earth radius. That is accurate
//! to well under a meter at the urban scales a geofence works with; antipodal
//! points and poles are not special-cased.

use crate::core::{Position, EARTH_RADIUS_M};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Great-circle distance between two points in meters
pub fn haversine_distance(a: &Position, b: &Position) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    // Rounding can push h just past 1 for near-antipodal points
    let h = ((delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Forward azimuth from `from` towards `to`, degrees clockwise from north in [0, 360)
pub fn initial_bearing(from: &Position, to: &Position) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// East/north offset of `to` relative to `from` in meters
///
/// Flat-earth tangent plane at `from`; only meaningful over short distances.
pub fn local_offset(from: &Position, to: &Position) -> Vector2<f64> {
    let lat_diff = (to.latitude - from.latitude).to_radians();
    let lon_diff = (to.longitude - from.longitude).to_radians();
    let ref_lat_rad = from.latitude.to_radians();

    Vector2::new(
        EARTH_RADIUS_M * lon_diff * ref_lat_rad.cos(),
        EARTH_RADIUS_M * lat_diff,
    )
}

/// Eight-point compass rose used for "head this way" hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompassDirection {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl CompassDirection {
    pub fn from_bearing(bearing_deg: f64) -> Self {
        const ROSE: [CompassDirection; 8] = [
            CompassDirection::North,
            CompassDirection::NorthEast,
            CompassDirection::East,
            CompassDirection::SouthEast,
            CompassDirection::South,
            CompassDirection::SouthWest,
            CompassDirection::West,
            CompassDirection::NorthWest,
        ];
        let sector = ((bearing_deg.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
        ROSE[sector]
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            CompassDirection::North => "N",
            CompassDirection::NorthEast => "NE",
            CompassDirection::East => "E",
            CompassDirection::SouthEast => "SE",
            CompassDirection::South => "S",
            CompassDirection::SouthWest => "SW",
            CompassDirection::West => "W",
            CompassDirection::NorthWest => "NW",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bangalore() -> Position {
        Position::new(12.9716, 77.5946)
    }

    #[test]
    fn test_identical_points_have_zero_distance() {
        let p = bangalore();
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = bangalore();
        let b = Position::new(12.9800, 77.6000);
        assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));

        let c = Position::new(-33.8688, 151.2093);
        let d = Position::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&c, &d), haversine_distance(&d, &c));
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(1.0, 0.0);
        // R * pi / 180
        let distance = haversine_distance(&a, &b);
        assert!((distance - 111_194.93).abs() < 0.1, "got {}", distance);
    }

    #[test]
    fn test_short_urban_distances() {
        let dest = bangalore();

        let near = haversine_distance(&Position::new(12.9718, 77.5947), &dest);
        assert!(near > 20.0 && near < 30.0, "got {}", near);

        let outside = haversine_distance(&Position::new(12.9719, 77.5948), &dest);
        assert!(outside > 30.0 && outside < 45.0, "got {}", outside);

        let far = haversine_distance(&Position::new(12.9800, 77.6000), &dest);
        assert!(far > 1000.0 && far < 1300.0, "got {}", far);
    }

    #[test]
    fn test_distance_is_never_negative() {
        let samples = [
            Position::new(89.9, 179.9),
            Position::new(-89.9, -179.9),
            Position::new(0.0, 180.0),
            Position::new(0.0, -180.0),
        ];
        for a in &samples {
            for b in &samples {
                assert!(haversine_distance(a, b) >= 0.0);
            }
        }
    }

    #[test]
    fn test_antipodal_points_are_half_a_circumference() {
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_M;
        let pairs = [
            (Position::new(-79.1189, -168.1267), Position::new(79.1189, 11.8733)),
            (Position::new(0.0, 0.0), Position::new(0.0, 180.0)),
            (Position::new(45.0, -90.0), Position::new(-45.0, 90.0)),
        ];
        for (a, b) in &pairs {
            let distance = haversine_distance(a, b);
            assert!(distance.is_finite(), "{:?} -> {:?}", a, b);
            assert!((distance - half_circumference).abs() < 1.0);
        }

        for step in 0..180 {
            let latitude = -89.5 + step as f64;
            let longitude = -179.0 + step as f64 * 0.97;
            let a = Position::new(latitude, longitude);
            let b = Position::new(-latitude, longitude + 180.0);
            assert!(!haversine_distance(&a, &b).is_nan());
        }
    }

    #[test]
    fn test_initial_bearing_cardinal_points() {
        let origin = Position::new(0.0, 0.0);
        assert!((initial_bearing(&origin, &Position::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((initial_bearing(&origin, &Position::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((initial_bearing(&origin, &Position::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((initial_bearing(&origin, &Position::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_offset_agrees_with_haversine_nearby() {
        let from = bangalore();
        let to = Position::new(12.9730, 77.5960);
        let offset = local_offset(&from, &to);

        assert!(offset.x > 0.0);
        assert!(offset.y > 0.0);
        assert!((offset.norm() - haversine_distance(&from, &to)).abs() < 0.5);
    }

    #[test]
    fn test_compass_direction() {
        assert_eq!(CompassDirection::from_bearing(0.0), CompassDirection::North);
        assert_eq!(CompassDirection::from_bearing(359.0), CompassDirection::North);
        assert_eq!(CompassDirection::from_bearing(44.0), CompassDirection::NorthEast);
        assert_eq!(CompassDirection::from_bearing(90.0), CompassDirection::East);
        assert_eq!(CompassDirection::from_bearing(200.0), CompassDirection::South);
        assert_eq!(CompassDirection::from_bearing(-45.0), CompassDirection::NorthWest);
        assert_eq!(CompassDirection::SouthWest.abbreviation(), "SW");
    }
}
