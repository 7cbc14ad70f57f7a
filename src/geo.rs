//! Geo primitives (C1): great-circle distance, travel-time estimate, and a
//! within-radius scan over a population of located entities.
//!
//! The distance formula is adapted directly from the teacher's
//! `spatial::distance_km_between_cells` (haversine over two `h3o::LatLng`
//! points), generalized from H3 cell centers to raw [`Location`] values.

use crate::model::Location;

/// Mean earth radius in km, matching spec.md §3.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two locations, in km.
///
/// Symmetric to 5 decimal places; zero iff the two locations are equal.
pub fn distance_km(a: Location, b: Location) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Travel time in whole minutes between two locations at the given average
/// speed and traffic factor. Zero-distance inputs yield exactly 0 minutes.
pub fn travel_time_minutes(
    origin: Location,
    destination: Location,
    average_speed_kmh: f64,
    traffic_factor: f64,
) -> u32 {
    let distance = distance_km(origin, destination);
    if distance <= 0.0 || average_speed_kmh <= 0.0 {
        return 0;
    }
    let hours = distance / average_speed_kmh * traffic_factor;
    (hours * 60.0).round() as u32
}

/// A located entity reference, returned by [`within_radius`], sorted by
/// ascending distance to the scan target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusMatch<'a> {
    pub id: &'a str,
    pub distance_km: f64,
}

/// Scan an `id -> location` population and return the ids within `radius_km`
/// of `target`, sorted by ascending distance.
pub fn within_radius<'a, I>(entities: I, target: Location, radius_km: f64) -> Vec<RadiusMatch<'a>>
where
    I: IntoIterator<Item = (&'a str, Location)>,
{
    let mut matches: Vec<RadiusMatch<'a>> = entities
        .into_iter()
        .filter_map(|(id, loc)| {
            let distance = distance_km(target, loc);
            (distance <= radius_km).then_some(RadiusMatch {
                id,
                distance_km: distance,
            })
        })
        .collect();
    matches.sort_by(|a, b| a.distance_km.partial_cmp(&b.distance_km).unwrap());
    matches
}
