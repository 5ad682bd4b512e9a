//! Classification of live observations into ranked arrival info.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ArrivalObservation, StopStatus};

/// Sort key for "last bus departed", ranked just before every other
/// no-data reason.
pub const LAST_BUS_SORT_KEY: i64 = i64::MAX - 1;

/// Sort key for every other no-data reason.
pub const NO_DATA_SORT_KEY: i64 = i64::MAX;

/// Coarse arrival status. Declaration order is rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArrivalStatus {
    Coming,
    Scheduled,
    NoData,
}

/// Arrival status, a sort key in seconds, and display text.
///
/// Ordered by status, then sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArrivalInfo {
    pub status: ArrivalStatus,
    pub sort_key: i64,
    pub display: String,
}

impl ArrivalInfo {
    fn new(status: ArrivalStatus, sort_key: i64, display: impl Into<String>) -> Self {
        Self {
            status,
            sort_key,
            display: display.into(),
        }
    }

    /// Placeholder for a route with no usable observation.
    pub fn no_data() -> Self {
        Self::new(ArrivalStatus::NoData, NO_DATA_SORT_KEY, "未發車")
    }

    pub fn is_no_data(&self) -> bool {
        self.status == ArrivalStatus::NoData
    }
}

fn coming(secs: i64) -> ArrivalInfo {
    let display = match secs {
        s if s < 30 => "進站中".to_string(),
        s if s < 60 => "即將進站".to_string(),
        s => format!("{} 分", s / 60),
    };
    ArrivalInfo::new(ArrivalStatus::Coming, secs, display)
}

fn scheduled(raw: &str, now: DateTime<Utc>) -> Option<ArrivalInfo> {
    let at = match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(at) => at,
        Err(e) => {
            warn!(next_bus_time = raw, error = %e, "failed to parse next bus time");
            return None;
        }
    };

    if at < now {
        return Some(ArrivalInfo::new(
            ArrivalStatus::NoData,
            LAST_BUS_SORT_KEY,
            "末班已過",
        ));
    }

    let secs = at.signed_duration_since(now).num_seconds().max(0);
    Some(ArrivalInfo::new(
        ArrivalStatus::Scheduled,
        secs,
        format!("預計 {}", at.format("%H:%M")),
    ))
}

fn from_status(status: Option<StopStatus>) -> ArrivalInfo {
    match status {
        Some(StopStatus::TrafficControl) => {
            ArrivalInfo::new(ArrivalStatus::NoData, NO_DATA_SORT_KEY, "交管不停")
        }
        Some(StopStatus::LastBusGone) => {
            ArrivalInfo::new(ArrivalStatus::NoData, LAST_BUS_SORT_KEY, "末班已過")
        }
        Some(StopStatus::NotOperatingToday) => {
            ArrivalInfo::new(ArrivalStatus::NoData, NO_DATA_SORT_KEY, "今日未營運")
        }
        _ => ArrivalInfo::no_data(),
    }
}

/// Classify one observation as of `now`.
///
/// A non-negative estimate wins, then a parseable next-bus time, then the
/// stop status.
pub fn classify(observation: &ArrivalObservation, now: DateTime<Utc>) -> ArrivalInfo {
    if let Some(secs) = observation.estimate_secs
        && secs >= 0
    {
        return coming(secs);
    }

    if let Some(raw) = observation.next_bus_time.as_deref()
        && !raw.trim().is_empty()
        && let Some(info) = scheduled(raw, now)
    {
        return info;
    }

    from_status(observation.stop_status)
}

/// Observations paired with their classification, best first.
///
/// Ties keep their input order.
pub fn rank_observations(
    observations: Vec<ArrivalObservation>,
    now: DateTime<Utc>,
) -> Vec<(ArrivalObservation, ArrivalInfo)> {
    let mut ranked: Vec<_> = observations
        .into_iter()
        .map(|o| {
            let info = classify(&o, now);
            (o, info)
        })
        .collect();
    ranked.sort_by_key(|(_, info)| (info.status, info.sort_key));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RouteUid;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        // 2026-03-02 10:00 in Taipei
        Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap()
    }

    fn obs() -> ArrivalObservation {
        ArrivalObservation::new(RouteUid::new("TPE307"))
    }

    #[test]
    fn estimate_bands() {
        let at = |s| classify(&obs().with_estimate(s), now());

        assert_eq!(at(25).status, ArrivalStatus::Coming);
        assert_eq!(at(25).display, "進站中");
        assert_eq!(at(45).display, "即將進站");
        assert_eq!(at(180).display, "3 分");
        assert_eq!(at(180).sort_key, 180);
        assert_eq!(at(0).display, "進站中");
        assert_eq!(at(119).display, "1 分");
    }

    #[test]
    fn negative_estimate_falls_through() {
        let info = classify(
            &obs().with_estimate(-1).with_status(StopStatus::NotOperatingToday),
            now(),
        );
        assert_eq!(info.status, ArrivalStatus::NoData);
        assert_eq!(info.display, "今日未營運");
    }

    #[test]
    fn future_next_bus_is_scheduled() {
        let info = classify(&obs().with_next_bus_time("2026-03-02T10:15:00+08:00"), now());
        assert_eq!(info.status, ArrivalStatus::Scheduled);
        assert_eq!(info.sort_key, 15 * 60);
        assert_eq!(info.display, "預計 10:15");
    }

    #[test]
    fn past_next_bus_is_last_bus() {
        let info = classify(&obs().with_next_bus_time("2026-03-02T09:15:00+08:00"), now());
        assert_eq!(info.status, ArrivalStatus::NoData);
        assert_eq!(info.sort_key, LAST_BUS_SORT_KEY);
        assert_eq!(info.display, "末班已過");
    }

    #[test]
    fn unparseable_next_bus_uses_status() {
        let info = classify(
            &obs()
                .with_next_bus_time("tomorrow-ish")
                .with_status(StopStatus::TrafficControl),
            now(),
        );
        assert_eq!(info.display, "交管不停");
        assert_eq!(info.sort_key, NO_DATA_SORT_KEY);
    }

    #[test]
    fn status_codes() {
        let with = |s| classify(&obs().with_status(s), now());
        assert_eq!(with(StopStatus::LastBusGone).sort_key, LAST_BUS_SORT_KEY);
        assert_eq!(with(StopStatus::LastBusGone).display, "末班已過");
        assert_eq!(with(StopStatus::NotDeparted).display, "未發車");
        assert_eq!(with(StopStatus::Other(9)).sort_key, NO_DATA_SORT_KEY);
        assert_eq!(classify(&obs(), now()), ArrivalInfo::no_data());
    }

    #[test]
    fn last_bus_ranks_before_other_no_data() {
        let last = classify(&obs().with_status(StopStatus::LastBusGone), now());
        let none = classify(&obs().with_status(StopStatus::NotOperatingToday), now());
        assert!(last < none);
    }

    #[test]
    fn ranking_orders_by_status_then_key() {
        let ranked = rank_observations(
            vec![
                obs().with_status(StopStatus::LastBusGone),
                obs().with_next_bus_time("2026-03-02T10:05:00+08:00"),
                obs().with_estimate(600),
                obs().with_estimate(60),
            ],
            now(),
        );
        let keys: Vec<_> = ranked.iter().map(|(_, i)| (i.status, i.sort_key)).collect();
        assert_eq!(
            keys,
            vec![
                (ArrivalStatus::Coming, 60),
                (ArrivalStatus::Coming, 600),
                (ArrivalStatus::Scheduled, 300),
                (ArrivalStatus::NoData, LAST_BUS_SORT_KEY),
            ]
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::RouteUid;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn observation() -> impl Strategy<Value = ArrivalObservation> {
        (
            prop::option::of(-100i64..100_000),
            prop::option::of(-7200i64..7200),
            prop::option::of(0i64..6),
        )
            .prop_map(|(estimate, offset, status)| {
                let base = Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap();
                let mut o = ArrivalObservation::new(RouteUid::new("R"));
                o.estimate_secs = estimate;
                o.next_bus_time = offset.map(|s| (base + chrono::Duration::seconds(s)).to_rfc3339());
                o.stop_status = status.map(StopStatus::from_code);
                o
            })
    }

    proptest! {
        /// Status dominates the sort key
        #[test]
        fn status_dominates_key(a in observation(), b in observation()) {
            let now = Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).unwrap();
            let (x, y) = (classify(&a, now), classify(&b, now));
            if x.status < y.status {
                prop_assert!(x < y);
            }
            if x.status == ArrivalStatus::Coming {
                prop_assert!(x.sort_key >= 0);
            }
            if x.status == ArrivalStatus::Scheduled {
                prop_assert!(x.sort_key >= 0 && x.sort_key < LAST_BUS_SORT_KEY);
            }
        }
    }
}
