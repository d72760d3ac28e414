//! Vehicle classification by report recency.

use chrono::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    archive_cutoff, ActivityTier, ClassifiedVehicle, LocalTime, Position, VehicleIdentity,
    VehicleSighting,
};
use crate::route::{normalize_line, NO_LINE};

/// Shown for sightings without a garage number
const NO_VEHICLE_ID: &str = "N/A";

/// Why a sighting was left off the map
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("missing report time")]
    MissingTimestamp,

    #[error("unparseable report time {0:?}")]
    InvalidTimestamp(String),

    #[error("unparseable {axis} {value:?}")]
    InvalidCoordinate { axis: &'static str, value: String },

    #[error("no GPS fix")]
    NoFix,
}

/// Assign an activity tier to a report time.
///
/// Archived is decided first: a pre-cutoff timestamp is archived no matter
/// how it compares to `now`.
pub fn activity_tier(last_seen: LocalTime, now: LocalTime) -> ActivityTier {
    if last_seen < archive_cutoff() {
        ActivityTier::Archived
    } else if last_seen > now - Duration::minutes(10) {
        ActivityTier::Active0to10
    } else if last_seen > now - Duration::minutes(60) {
        ActivityTier::Active10to60
    } else if last_seen > now - Duration::hours(24) {
        ActivityTier::Inactive1to24h
    } else {
        ActivityTier::InactiveOver24h
    }
}

/// Classify a single sighting relative to `now`.
pub fn classify(
    sighting: &VehicleSighting,
    now: LocalTime,
) -> Result<ClassifiedVehicle, Rejection> {
    let raw_time = sighting
        .last_report_time
        .as_deref()
        .ok_or(Rejection::MissingTimestamp)?;
    let last_seen = sighting
        .reported_at()
        .ok_or_else(|| Rejection::InvalidTimestamp(raw_time.to_string()))?;

    let lat = parse_coordinate("latitude", sighting.latitude.as_deref())?;
    let lon = parse_coordinate("longitude", sighting.longitude.as_deref())?;
    if lat == 0.0 || lon == 0.0 {
        return Err(Rejection::NoFix);
    }

    let vehicle_id = sighting.id().unwrap_or(NO_VEHICLE_ID).to_string();
    let route_code = sighting.route_code.as_deref();

    Ok(ClassifiedVehicle {
        identity: VehicleIdentity::from_vehicle_id(&vehicle_id),
        vehicle_id,
        route_code: route_code
            .filter(|code| !code.is_empty())
            .unwrap_or(NO_LINE)
            .to_string(),
        line_number: normalize_line(route_code),
        position: Position { lat, lon },
        last_seen,
        activity_tier: activity_tier(last_seen, now),
    })
}

/// Classify a batch, skipping rejected sightings.
pub fn classify_batch(sightings: &[VehicleSighting], now: LocalTime) -> Vec<ClassifiedVehicle> {
    sightings
        .iter()
        .filter_map(|sighting| match classify(sighting, now) {
            Ok(vehicle) => Some(vehicle),
            Err(reason) => {
                debug!(
                    "Skipping vehicle {}: {}",
                    sighting.id().unwrap_or("<no id>"),
                    reason
                );
                None
            }
        })
        .collect()
}

/// Missing coordinates count as zero, i.e. no fix.
fn parse_coordinate(axis: &'static str, value: Option<&str>) -> Result<f64, Rejection> {
    let Some(value) = value else {
        return Ok(0.0);
    };
    match value.trim().replace(',', ".").parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(Rejection::InvalidCoordinate {
            axis,
            value: value.to_string(),
        }),
    }
}

/// Number of classified vehicles per tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub active: usize,
    pub mid: usize,
    pub day: usize,
    pub old: usize,
    pub archive: usize,
}

impl TierCounts {
    pub fn from_vehicles(vehicles: &[ClassifiedVehicle]) -> Self {
        let mut counts = Self::default();
        for vehicle in vehicles {
            *counts.slot(vehicle.activity_tier) += 1;
        }
        counts
    }

    pub fn get(&self, tier: ActivityTier) -> usize {
        match tier {
            ActivityTier::Active0to10 => self.active,
            ActivityTier::Active10to60 => self.mid,
            ActivityTier::Inactive1to24h => self.day,
            ActivityTier::InactiveOver24h => self.old,
            ActivityTier::Archived => self.archive,
        }
    }

    pub fn total(&self) -> usize {
        self.active + self.mid + self.day + self.old + self.archive
    }

    fn slot(&mut self, tier: ActivityTier) -> &mut usize {
        match tier {
            ActivityTier::Active0to10 => &mut self.active,
            ActivityTier::Active10to60 => &mut self.mid,
            ActivityTier::Inactive1to24h => &mut self.day,
            ActivityTier::InactiveOver24h => &mut self.old,
            ActivityTier::Archived => &mut self.archive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operator, FEED_TIME_FORMAT, REGION_TZ};
    use chrono::TimeZone;

    fn now() -> LocalTime {
        REGION_TZ.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn sighting_at(ts: LocalTime) -> VehicleSighting {
        VehicleSighting {
            vehicle_id: Some("30042".to_string()),
            route_code: Some("1605".to_string()),
            latitude: Some("44,0141".to_string()),
            longitude: Some("20,9116".to_string()),
            last_report_time: Some(ts.format(FEED_TIME_FORMAT).to_string()),
        }
    }

    #[test]
    fn five_minutes_old_is_active() {
        let vehicle = classify(&sighting_at(now() - Duration::minutes(5)), now()).unwrap();

        assert_eq!(vehicle.activity_tier, ActivityTier::Active0to10);
        assert_eq!(vehicle.vehicle_id, "30042");
        assert_eq!(vehicle.identity.operator, Operator::Strela);
        assert_eq!(vehicle.identity.internal_number, "042");
        assert_eq!(vehicle.route_code, "1605");
        assert_eq!(vehicle.line_number, "605");
        assert_eq!(
            vehicle.position,
            Position {
                lat: 44.0141,
                lon: 20.9116
            }
        );
        assert_eq!(vehicle.last_seen, now() - Duration::minutes(5));
    }

    #[test]
    fn tier_boundaries() {
        let n = now();
        let cases = [
            (Duration::seconds(0), ActivityTier::Active0to10),
            (Duration::minutes(10) - Duration::seconds(1), ActivityTier::Active0to10),
            (Duration::minutes(10), ActivityTier::Active10to60),
            (Duration::minutes(59), ActivityTier::Active10to60),
            (Duration::minutes(60), ActivityTier::Inactive1to24h),
            (Duration::hours(23), ActivityTier::Inactive1to24h),
            (Duration::hours(24), ActivityTier::InactiveOver24h),
            (Duration::days(300), ActivityTier::InactiveOver24h),
        ];

        for (age, expected) in cases {
            assert_eq!(activity_tier(n - age, n), expected, "age {age}");
        }
    }

    #[test]
    fn pre_cutoff_is_archived_unconditionally() {
        let old = REGION_TZ.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();

        assert_eq!(activity_tier(old, old), ActivityTier::Archived);
        assert_eq!(activity_tier(old, now()), ActivityTier::Archived);
        assert_eq!(
            activity_tier(archive_cutoff(), archive_cutoff()),
            ActivityTier::Active0to10
        );
    }

    #[test]
    fn zero_coordinates_are_rejected() {
        let mut zero_lat = sighting_at(now());
        zero_lat.latitude = Some("0".to_string());
        assert_eq!(classify(&zero_lat, now()), Err(Rejection::NoFix));

        let mut zero_lon = sighting_at(now());
        zero_lon.longitude = Some("0,0".to_string());
        assert_eq!(classify(&zero_lon, now()), Err(Rejection::NoFix));

        let mut missing = sighting_at(now());
        missing.latitude = None;
        assert_eq!(classify(&missing, now()), Err(Rejection::NoFix));
    }

    #[test]
    fn malformed_fields_are_rejected() {
        let mut bad_lat = sighting_at(now());
        bad_lat.latitude = Some("north".to_string());
        assert!(matches!(
            classify(&bad_lat, now()),
            Err(Rejection::InvalidCoordinate {
                axis: "latitude",
                ..
            })
        ));

        let mut nan = sighting_at(now());
        nan.longitude = Some("NaN".to_string());
        assert!(matches!(
            classify(&nan, now()),
            Err(Rejection::InvalidCoordinate {
                axis: "longitude",
                ..
            })
        ));

        let mut bad_time = sighting_at(now());
        bad_time.last_report_time = Some("yesterday".to_string());
        assert_eq!(
            classify(&bad_time, now()),
            Err(Rejection::InvalidTimestamp("yesterday".to_string()))
        );

        let mut no_time = sighting_at(now());
        no_time.last_report_time = None;
        assert_eq!(classify(&no_time, now()), Err(Rejection::MissingTimestamp));
    }

    #[test]
    fn missing_id_and_route_are_displayed_as_na() {
        let mut sighting = sighting_at(now());
        sighting.vehicle_id = None;
        sighting.route_code = None;

        let vehicle = classify(&sighting, now()).unwrap();
        assert_eq!(vehicle.vehicle_id, "N/A");
        assert_eq!(vehicle.identity.operator, Operator::Unknown);
        assert_eq!(vehicle.route_code, "N/A");
        assert_eq!(vehicle.line_number, "N/A");
    }

    #[test]
    fn batch_skips_rejected_records() {
        let mut invalid = sighting_at(now());
        invalid.latitude = Some("0".to_string());
        let batch = vec![
            sighting_at(now() - Duration::minutes(30)),
            invalid,
            VehicleSighting::default(),
            sighting_at(now() - Duration::hours(2)),
        ];

        let vehicles = classify_batch(&batch, now());
        assert_eq!(vehicles.len(), 2);

        let counts = TierCounts::from_vehicles(&vehicles);
        assert_eq!(counts.get(ActivityTier::Active10to60), 1);
        assert_eq!(counts.get(ActivityTier::Inactive1to24h), 1);
        assert_eq!(counts.total(), 2);
    }
}
