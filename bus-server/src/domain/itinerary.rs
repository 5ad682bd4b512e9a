//! Itinerary types.
//!
//! An `Itinerary` is the multi-leg skeleton an external directions provider
//! produced, with departure and arrival instants filled in as live data
//! resolves them.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::geo::Coord;

/// Vehicle kind reported for a transit leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Bus,
    IntercityBus,
    Subway,
    Rail,
    Tram,
    Ferry,
    Other,
}

/// Details only a transit leg carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitDetails {
    /// Line name as the directions provider spells it. Not guaranteed to
    /// match the transit provider's route name.
    pub line_name: String,
    pub headsign: Option<String>,
    pub departure_stop: String,
    pub arrival_stop: String,
    pub stop_count: u32,
    pub vehicle: VehicleKind,
}

/// How a leg is travelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegMode {
    Walk,
    Transit(TransitDetails),
}

/// One leg of an itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub mode: LegMode,
    #[serde(default)]
    pub polyline: Vec<Coord>,
    pub start: Coord,
    pub end: Coord,
    pub duration_secs: i64,
    pub departure: Option<DateTime<Utc>>,
    pub arrival: Option<DateTime<Utc>>,
}

impl Leg {
    pub fn is_transit(&self) -> bool {
        matches!(self.mode, LegMode::Transit(_))
    }

    pub fn transit(&self) -> Option<&TransitDetails> {
        match &self.mode {
            LegMode::Transit(details) => Some(details),
            LegMode::Walk => None,
        }
    }
}

/// An ordered sequence of legs.
///
/// Once fully resolved, each leg's arrival equals the next leg's departure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub legs: Vec<Leg>,
}

impl Itinerary {
    pub fn new(legs: Vec<Leg>) -> Self {
        Self { legs }
    }

    /// Departure of the first leg.
    pub fn departure(&self) -> Option<DateTime<Utc>> {
        self.legs.first().and_then(|l| l.departure)
    }

    /// Arrival of the last leg.
    pub fn arrival(&self) -> Option<DateTime<Utc>> {
        self.legs.last().and_then(|l| l.arrival)
    }

    pub fn total_duration_secs(&self) -> i64 {
        self.legs.iter().map(|l| l.duration_secs).sum()
    }

    /// `HH:MM` in `offset`, or `--:--` when unresolved.
    pub fn departure_display(&self, offset: FixedOffset) -> String {
        format_hhmm(self.departure(), offset)
    }

    pub fn arrival_display(&self, offset: FixedOffset) -> String {
        format_hhmm(self.arrival(), offset)
    }

    /// Whether every adjacent pair of legs shares its boundary instant.
    pub fn is_contiguous(&self) -> bool {
        self.legs
            .windows(2)
            .all(|w| w[0].arrival.is_some() && w[0].arrival == w[1].departure)
    }
}

pub fn format_hhmm(instant: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    match instant {
        Some(t) => t.with_timezone(&offset).format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn walk(duration_secs: i64) -> Leg {
        Leg {
            mode: LegMode::Walk,
            polyline: vec![],
            start: Coord::new(25.0, 121.5),
            end: Coord::new(25.0, 121.501),
            duration_secs,
            departure: None,
            arrival: None,
        }
    }

    #[test]
    fn unresolved_times_display_placeholder() {
        let it = Itinerary::new(vec![walk(60)]);
        let taipei = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(it.departure_display(taipei), "--:--");
        assert_eq!(it.arrival_display(taipei), "--:--");
        assert!(Itinerary::new(vec![]).departure().is_none());
    }

    #[test]
    fn display_in_offset() {
        let mut leg = walk(60);
        leg.departure = Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 5, 0).unwrap());
        leg.arrival = Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 6, 0).unwrap());
        let it = Itinerary::new(vec![leg]);
        let taipei = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(it.departure_display(taipei), "08:05");
        assert_eq!(it.arrival_display(taipei), "08:06");
    }

    #[test]
    fn contiguity() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 1, 0).unwrap();
        let mut a = walk(60);
        a.departure = Some(t0);
        a.arrival = Some(t1);
        let mut b = walk(60);
        b.departure = Some(t1);
        let it = Itinerary::new(vec![a.clone(), b]);
        assert!(it.is_contiguous());

        let it = Itinerary::new(vec![a, walk(60)]);
        assert!(!it.is_contiguous());
    }

    #[test]
    fn leg_mode_serialization() {
        let json = serde_json::to_value(LegMode::Walk).unwrap();
        assert_eq!(json["kind"], "walk");
    }
}
