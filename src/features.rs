//! Feature derivation
//!
//! This module derives features the user does not supply directly:
//! - Great-circle distance between restaurant and delivery point
//! - Minutes between order placement and pickup

use chrono::{NaiveDate, NaiveDateTime};

use crate::types::{Coordinate, DerivedFeatures, DistanceSource, RawOrderInput};

/// Mean Earth radius used by the haversine formula (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Feature deriver for computing derived delivery features
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Derive distance and time-delta features from raw input.
    ///
    /// A routed distance, when present, takes precedence over the haversine
    /// distance. A missing order date anchors both times to the same day.
    pub fn derive(input: &RawOrderInput) -> DerivedFeatures {
        let (distance_km, distance_source) =
            match (input.routed_distance_km, input.restaurant, input.delivery) {
                (Some(km), _, _) => (Some(km), Some(DistanceSource::Routed)),
                (None, Some(a), Some(b)) => {
                    (Some(distance_km(&a, &b)), Some(DistanceSource::Haversine))
                }
                _ => (None, None),
            };

        let time_delta_minutes = match (input.ordered_at, input.picked_at) {
            (Some(ordered), Some(picked)) => {
                let date = input.order_date.unwrap_or(NaiveDate::MIN);
                Some(time_delta_minutes(
                    date.and_time(ordered),
                    date.and_time(picked),
                ))
            }
            _ => None,
        };

        DerivedFeatures {
            distance_km,
            distance_source,
            time_delta_minutes,
        }
    }
}

/// Great-circle distance between two points (km)
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = lat_b - lat_a;
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push h marginally above 1 for antipodal points
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Absolute difference between two timestamps (minutes).
///
/// A pickup stamped before the order yields the same positive delta; orders
/// crossing midnight on a single date are not corrected.
pub fn time_delta_minutes(ordered_at: NaiveDateTime, picked_at: NaiveDateTime) -> f64 {
    let seconds = (picked_at - ordered_at).num_seconds().abs();
    seconds as f64 / 60.0
}
