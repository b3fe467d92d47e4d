//! Order drafts
//!
//! Session-scoped state for assembling a `RawOrderInput` across several user
//! interactions (map picks, address searches, route lookups). The draft is
//! owned by the caller and passed explicitly; nothing here is global.

use serde::{Deserialize, Serialize};

use crate::collaborators::{geocode, resolve_distance, DistanceEstimate, Geocoder, Router};
use crate::error::EtaError;
use crate::types::{Coordinate, DistanceSource, RawOrderInput};

/// Which point the next map pick fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickTarget {
    #[default]
    Restaurant,
    Delivery,
}

/// An order being assembled by one user session
#[derive(Debug, Clone, Default)]
pub struct OrderDraft {
    input: RawOrderInput,
    next_pick: PickTarget,
}

impl OrderDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from partially filled input
    pub fn from_input(input: RawOrderInput) -> Self {
        let next_pick = match (input.restaurant, input.delivery) {
            (Some(_), None) => PickTarget::Delivery,
            _ => PickTarget::Restaurant,
        };
        Self { input, next_pick }
    }

    pub fn input(&self) -> &RawOrderInput {
        &self.input
    }

    /// Mutable access for the non-location form fields
    pub fn input_mut(&mut self) -> &mut RawOrderInput {
        &mut self.input
    }

    pub fn next_pick(&self) -> PickTarget {
        self.next_pick
    }

    /// Record a map pick.
    ///
    /// Picks alternate restaurant, delivery; a pick after both are set starts
    /// over with a new restaurant and clears the delivery point.
    pub fn pick(&mut self, coordinate: Coordinate) -> Result<PickTarget, EtaError> {
        coordinate.validate()?;
        let target = self.next_pick;
        match target {
            PickTarget::Restaurant => {
                self.set_restaurant(coordinate);
                self.input.delivery = None;
                self.next_pick = PickTarget::Delivery;
            }
            PickTarget::Delivery => {
                self.set_delivery(coordinate);
                self.next_pick = PickTarget::Restaurant;
            }
        }
        Ok(target)
    }

    pub fn set_restaurant(&mut self, coordinate: Coordinate) {
        self.input.restaurant = Some(coordinate);
        self.input.routed_distance_km = None;
    }

    pub fn set_delivery(&mut self, coordinate: Coordinate) {
        self.input.delivery = Some(coordinate);
        self.input.routed_distance_km = None;
    }

    /// Geocode and set the restaurant location
    pub fn set_restaurant_address(
        &mut self,
        geocoder: &dyn Geocoder,
        address: &str,
    ) -> Result<Coordinate, EtaError> {
        let coordinate = geocode(geocoder, address)?;
        self.set_restaurant(coordinate);
        Ok(coordinate)
    }

    /// Geocode and set the delivery location
    pub fn set_delivery_address(
        &mut self,
        geocoder: &dyn Geocoder,
        address: &str,
    ) -> Result<Coordinate, EtaError> {
        let coordinate = geocode(geocoder, address)?;
        self.set_delivery(coordinate);
        Ok(coordinate)
    }

    /// Look up the driving distance between the two points.
    ///
    /// Returns `None` until both points are set. Only a routed distance is
    /// stored on the draft; a haversine fallback is left to the encoder.
    pub fn resolve_route(&mut self, router: &dyn Router) -> Option<DistanceEstimate> {
        let (from, to) = (self.input.restaurant?, self.input.delivery?);
        let estimate = resolve_distance(router, &from, &to);
        self.input.routed_distance_km = match estimate.source {
            DistanceSource::Routed => Some(estimate.km),
            DistanceSource::Haversine => None,
        };
        Some(estimate)
    }

    /// Forget both locations and any resolved route
    pub fn clear_points(&mut self) {
        self.input.restaurant = None;
        self.input.delivery = None;
        self.input.routed_distance_km = None;
        self.next_pick = PickTarget::Restaurant;
    }

    /// Validate and snapshot the draft for encoding
    pub fn build(&self) -> Result<RawOrderInput, EtaError> {
        self.input.validate()?;
        Ok(self.input.clone())
    }
}
