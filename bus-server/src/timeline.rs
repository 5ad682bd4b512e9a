//! Re-timing an itinerary around a chosen live arrival.
//!
//! The directions provider's skeleton carries durations but its instants
//! are only a guess. Choosing a live arrival for one transit leg pins that
//! leg's departure to `now + sort_key`; every other leg is then laid out
//! back to back from it using the skeleton's durations.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::arrivals::ArrivalInfo;
use crate::domain::Itinerary;

/// Error re-timing an itinerary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItineraryError {
    #[error("leg {index} out of range for itinerary of {len} legs")]
    LegOutOfRange { index: usize, len: usize },

    #[error("leg {0} is not a transit leg")]
    NotTransit(usize),

    #[error("resolved time out of range")]
    TimeOverflow,
}

fn shift(t: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, ItineraryError> {
    let delta = Duration::try_seconds(secs).ok_or(ItineraryError::TimeOverflow)?;
    t.checked_add_signed(delta).ok_or(ItineraryError::TimeOverflow)
}

fn unshift(t: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>, ItineraryError> {
    let delta = Duration::try_seconds(secs).ok_or(ItineraryError::TimeOverflow)?;
    t.checked_sub_signed(delta).ok_or(ItineraryError::TimeOverflow)
}

/// Re-time `skeleton` so that transit leg `leg_index` departs `arrival`'s
/// sort key seconds after `now`.
///
/// Legs before it are laid out backwards and legs after it forwards, each
/// keeping its duration, so every leg's arrival equals the next leg's
/// departure. A no-data arrival yields the skeleton unchanged. The result
/// depends only on the arguments, so applying the same choice twice gives
/// the same instants.
pub fn apply_selected_arrival(
    skeleton: &Itinerary,
    leg_index: usize,
    arrival: &ArrivalInfo,
    now: DateTime<Utc>,
) -> Result<Itinerary, ItineraryError> {
    let len = skeleton.legs.len();
    let chosen = skeleton
        .legs
        .get(leg_index)
        .ok_or(ItineraryError::LegOutOfRange {
            index: leg_index,
            len,
        })?;
    if !chosen.is_transit() {
        return Err(ItineraryError::NotTransit(leg_index));
    }

    if arrival.is_no_data() {
        debug!(leg = leg_index, display = %arrival.display, "no live arrival, keeping skeleton");
        return Ok(skeleton.clone());
    }

    let mut legs = skeleton.legs.clone();

    let departure = shift(now, arrival.sort_key)?;
    let arrives = shift(departure, legs[leg_index].duration_secs)?;
    legs[leg_index].departure = Some(departure);
    legs[leg_index].arrival = Some(arrives);

    let mut boundary = departure;
    for leg in legs[..leg_index].iter_mut().rev() {
        leg.arrival = Some(boundary);
        boundary = unshift(boundary, leg.duration_secs)?;
        leg.departure = Some(boundary);
    }

    let mut boundary = arrives;
    for leg in legs[leg_index + 1..].iter_mut() {
        leg.departure = Some(boundary);
        boundary = shift(boundary, leg.duration_secs)?;
        leg.arrival = Some(boundary);
    }

    Ok(Itinerary::new(legs))
}
