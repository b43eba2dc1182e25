//! Great-circle distance between coordinates.

use geo::{HaversineDistance, Point};

/// Haversine distance in meters between two (latitude, longitude) pairs.
///
/// Uses the mean earth radius from the `geo` crate (6,371,008.8 m).
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    // geo points are (x = longitude, y = latitude)
    let from = Point::new(lon1, lat1);
    let to = Point::new(lon2, lat2);
    from.haversine_distance(&to)
}
