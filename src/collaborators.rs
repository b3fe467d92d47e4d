//! External collaborators
//!
//! Geocoding and routing are network-bound services owned by the host
//! application. This module defines the seams the core talks to and the
//! degraded fallbacks used when they fail. Implementations must bound their
//! own calls with explicit timeouts.

use serde::{Deserialize, Serialize};

use crate::error::EtaError;
use crate::features::distance_km;
use crate::types::{Coordinate, DistanceSource};

/// Resolves free-form addresses to coordinates
pub trait Geocoder {
    /// `Ok(None)` when the provider has no match for `address`
    fn resolve(&self, address: &str) -> Result<Option<Coordinate>, EtaError>;
}

/// A driving route between two points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Polyline of the route, start to end
    pub path: Vec<Coordinate>,
    /// Road distance (km)
    pub distance_km: f64,
    /// Provider's own duration estimate (minutes)
    pub duration_minutes: f64,
}

/// Computes driving routes between two points
pub trait Router {
    fn route(&self, from: &Coordinate, to: &Coordinate) -> Result<Route, EtaError>;
}

/// Distance between two points together with how it was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceEstimate {
    pub km: f64,
    pub source: DistanceSource,
    /// Route returned by the router, when it succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
}

/// Resolve an address, treating "no match" and out-of-range results as invalid
pub fn geocode(geocoder: &dyn Geocoder, address: &str) -> Result<Coordinate, EtaError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(EtaError::InvalidGeocode(address.to_string()));
    }

    match geocoder.resolve(address)? {
        Some(coordinate) => {
            coordinate
                .validate()
                .map_err(|_| EtaError::InvalidGeocode(address.to_string()))?;
            Ok(coordinate)
        }
        None => Err(EtaError::InvalidGeocode(address.to_string())),
    }
}

/// Road distance when the router answers, haversine distance otherwise.
///
/// Never fails: an unavailable router or an unusable route degrades to the
/// straight-line distance.
pub fn resolve_distance(
    router: &dyn Router,
    from: &Coordinate,
    to: &Coordinate,
) -> DistanceEstimate {
    match router.route(from, to) {
        Ok(route) if route.distance_km.is_finite() && route.distance_km >= 0.0 => {
            DistanceEstimate {
                km: route.distance_km,
                source: DistanceSource::Routed,
                route: Some(route),
            }
        }
        Ok(route) => {
            tracing::warn!(
                distance_km = route.distance_km,
                "router returned an unusable distance, falling back to haversine"
            );
            haversine_estimate(from, to)
        }
        Err(e) => {
            tracing::warn!(error = %e, "routing unavailable, falling back to haversine");
            haversine_estimate(from, to)
        }
    }
}

fn haversine_estimate(from: &Coordinate, to: &Coordinate) -> DistanceEstimate {
    DistanceEstimate {
        km: distance_km(from, to),
        source: DistanceSource::Haversine,
        route: None,
    }
}
