const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two coordinates, in meters rounded to the
/// nearest integer. Path rows carry the distance reported by the remote
/// feed; this is for independent checks against it.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> i64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    (EARTH_RADIUS_M * c).round() as i64
}

/// A composite station code like "A01,C01" reduces to its first component.
pub fn extract_first_station_code(station_codes: &str) -> &str {
    station_codes
        .split(',')
        .next()
        .unwrap_or(station_codes)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(haversine_distance_m(38.8977, -77.0365, 38.8977, -77.0365), 0);
    }

    #[test]
    fn one_degree_of_longitude_at_the_equator() {
        // 2 * pi * R / 360
        assert_eq!(haversine_distance_m(0.0, 0.0, 0.0, 1.0), 111195);
    }

    #[test]
    fn metro_center_to_gallery_place() {
        let distance = haversine_distance_m(38.898303, -77.028099, 38.89834, -77.021851);
        assert!((500..600).contains(&distance), "got {distance}");
    }

    #[test]
    fn composite_code_reduces_to_first_component() {
        assert_eq!(extract_first_station_code("A01,C01"), "A01");
        assert_eq!(extract_first_station_code("B01 , F01"), "B01");
        assert_eq!(extract_first_station_code("D03"), "D03");
    }
}
