//! Persisted per-vehicle history of first and last sightings.
//!
//! On disk the log is a JSON object keyed by garage number. Each value is a
//! three element list `[first_seen, last_seen, display_name]` with
//! timestamps formatted `DD.MM.YYYY HH:MM:SS` in regional time:
//!
//! ```json
//! {
//!     "30042": ["01.02.2024 06:10:00", "14.03.2025 08:30:15", "Ime Busa"]
//! }
//! ```
//!
//! Display names are edited by hand; the reconciler only ever writes the
//! placeholder for new vehicles.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::FleetMapError;
use crate::models::{archive_cutoff, parse_local, LocalTime, VehicleSighting, LOG_TIME_FORMAT};
use crate::storage::write_atomic;

/// Placeholder display name for vehicles nobody has named yet
pub const DEFAULT_DISPLAY_NAME: &str = "Ime Busa";

/// History of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry", into = "RawEntry")]
pub struct FleetLogEntry {
    pub first_seen: LocalTime,
    pub last_seen: LocalTime,
    pub display_name: String,
}

impl FleetLogEntry {
    fn first_sighting(seen: LocalTime) -> Self {
        Self {
            first_seen: seen,
            last_seen: seen,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
        }
    }
}

/// On-disk shape of an entry
#[derive(Debug, Serialize, Deserialize)]
struct RawEntry(String, String, String);

impl TryFrom<RawEntry> for FleetLogEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let RawEntry(first_seen, last_seen, display_name) = raw;
        let parse = |value: &str| {
            parse_local(value, LOG_TIME_FORMAT).ok_or_else(|| format!("invalid timestamp {value:?}"))
        };
        Ok(Self {
            first_seen: parse(&first_seen)?,
            last_seen: parse(&last_seen)?,
            display_name,
        })
    }
}

impl From<FleetLogEntry> for RawEntry {
    fn from(entry: FleetLogEntry) -> Self {
        RawEntry(
            entry.first_seen.format(LOG_TIME_FORMAT).to_string(),
            entry.last_seen.format(LOG_TIME_FORMAT).to_string(),
            entry.display_name,
        )
    }
}

/// Outcome of merging one batch into the log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    /// Sightings from before the archive cutoff
    pub archived: usize,
    /// Sightings without an id or a parseable timestamp
    pub skipped: usize,
}

/// All known vehicles, keyed by garage number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetLog {
    entries: HashMap<String, FleetLogEntry>,
}

impl FleetLog {
    /// Load the log from `path`.
    ///
    /// A missing file is a first run and yields an empty log, as does a file
    /// that is not valid JSON (invalid UTF-8 included). Other I/O errors are
    /// returned so the caller does not overwrite a log it could not read.
    pub fn load(path: &Path) -> Result<Self, FleetMapError> {
        match fs::read(path) {
            Ok(contents) => Ok(Self::from_slice(&contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No fleet log at {}, starting a new one", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse log file contents, dropping whatever cannot be read.
    pub fn from_json(contents: &str) -> Self {
        Self::from_slice(contents.as_bytes())
    }

    /// Parse raw log file bytes, dropping whatever cannot be read.
    pub fn from_slice(contents: &[u8]) -> Self {
        let raw: IndexMap<String, serde_json::Value> = match serde_json::from_slice(contents) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Fleet log is corrupt, starting from an empty log: {}", e);
                return Self::default();
            }
        };

        let entries = raw
            .into_iter()
            .filter_map(
                |(id, value)| match serde_json::from_value::<FleetLogEntry>(value) {
                    Ok(entry) => Some((id, entry)),
                    Err(e) => {
                        warn!("Dropping unreadable fleet log entry {}: {}", id, e);
                        None
                    }
                },
            )
            .collect();

        Self { entries }
    }

    /// Serialize the log, most recently seen vehicles first.
    pub fn to_json(&self) -> Result<String, FleetMapError> {
        let sorted: IndexMap<&str, &FleetLogEntry> = self
            .sorted_entries()
            .into_iter()
            .map(|(id, entry)| (id.as_str(), entry))
            .collect();

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        sorted.serialize(&mut serializer)?;

        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }

    /// Write the log to `path`, replacing the previous file atomically.
    pub fn save(&self, path: &Path) -> Result<(), FleetMapError> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes())?;
        info!(
            "Fleet log with {} vehicles saved to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }

    /// Merge a batch of sightings into the log.
    ///
    /// Only the id and report time are used, so sightings without a GPS fix
    /// still count. `last_seen` takes the timestamp of the latest processed
    /// sighting as-is.
    pub fn reconcile(&mut self, sightings: &[VehicleSighting]) -> ReconcileStats {
        let cutoff = archive_cutoff();
        let mut stats = ReconcileStats::default();

        for sighting in sightings {
            let (Some(id), Some(seen)) = (sighting.id(), sighting.reported_at()) else {
                stats.skipped += 1;
                continue;
            };

            if seen < cutoff {
                stats.archived += 1;
                continue;
            }

            match self.entries.get_mut(id) {
                Some(entry) => {
                    entry.last_seen = seen;
                    stats.updated += 1;
                }
                None => {
                    self.entries
                        .insert(id.to_string(), FleetLogEntry::first_sighting(seen));
                    stats.created += 1;
                }
            }
        }

        stats
    }

    pub fn get(&self, vehicle_id: &str) -> Option<&FleetLogEntry> {
        self.entries.get(vehicle_id)
    }

    /// Display name of a vehicle, unless it still has the placeholder
    pub fn display_name(&self, vehicle_id: &str) -> Option<&str> {
        self.get(vehicle_id)
            .map(|entry| entry.display_name.as_str())
            .filter(|name| !name.is_empty() && *name != DEFAULT_DISPLAY_NAME)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries by `last_seen` descending, ties by id
    pub fn sorted_entries(&self) -> Vec<(&String, &FleetLogEntry)> {
        let mut sorted: Vec<_> = self.entries.iter().collect();
        sorted.sort_by(|(a_id, a), (b_id, b)| {
            b.last_seen.cmp(&a.last_seen).then_with(|| a_id.cmp(b_id))
        });
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FEED_TIME_FORMAT, REGION_TZ};
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> LocalTime {
        REGION_TZ.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn sighting(id: &str, at: LocalTime) -> VehicleSighting {
        VehicleSighting {
            vehicle_id: Some(id.to_string()),
            last_report_time: Some(at.format(FEED_TIME_FORMAT).to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn new_vehicle_gets_entry() {
        let mut log = FleetLog::default();
        let seen = ts(2025, 3, 14, 8, 30);

        let stats = log.reconcile(&[sighting("30042", seen)]);

        assert_eq!(stats.created, 1);
        let entry = log.get("30042").unwrap();
        assert_eq!(entry.first_seen, seen);
        assert_eq!(entry.last_seen, seen);
        assert_eq!(entry.display_name, DEFAULT_DISPLAY_NAME);
    }

    #[test]
    fn reconciling_twice_is_idempotent() {
        let mut log = FleetLog::default();
        let seen = ts(2025, 3, 14, 8, 30);
        let batch = [sighting("30042", seen)];

        log.reconcile(&batch);
        let first = log.clone();
        let stats = log.reconcile(&batch);

        assert_eq!(stats.updated, 1);
        assert_eq!(log, first);
        assert_eq!(log.get("30042").unwrap().first_seen, seen);
        assert_eq!(log.get("30042").unwrap().last_seen, seen);
    }

    #[test]
    fn existing_entry_keeps_first_seen_and_name() {
        let mut log = FleetLog::default();
        log.entries.insert(
            "70007".to_string(),
            FleetLogEntry {
                first_seen: ts(2024, 2, 1, 6, 0),
                last_seen: ts(2024, 5, 1, 6, 0),
                display_name: "Ikarbus IK-112".to_string(),
            },
        );

        log.reconcile(&[sighting("70007", ts(2025, 1, 1, 12, 0))]);

        let entry = log.get("70007").unwrap();
        assert_eq!(entry.first_seen, ts(2024, 2, 1, 6, 0));
        assert_eq!(entry.last_seen, ts(2025, 1, 1, 12, 0));
        assert_eq!(entry.display_name, "Ikarbus IK-112");
        assert_eq!(log.display_name("70007"), Some("Ikarbus IK-112"));
    }

    #[test]
    fn last_sighting_in_batch_wins() {
        let mut log = FleetLog::default();
        let later = ts(2025, 3, 14, 9, 0);
        let earlier = later - Duration::hours(1);

        log.reconcile(&[sighting("30042", later), sighting("30042", earlier)]);

        let entry = log.get("30042").unwrap();
        assert_eq!(entry.first_seen, later);
        assert_eq!(entry.last_seen, earlier);
    }

    #[test]
    fn archived_sightings_are_ignored() {
        let mut log = FleetLog::default();

        let stats = log.reconcile(&[sighting("30042", ts(2023, 6, 1, 12, 0))]);

        assert_eq!(stats.archived, 1);
        assert!(log.is_empty());
    }

    #[test]
    fn unparseable_sightings_are_skipped() {
        let mut log = FleetLog::default();
        let batch = [
            VehicleSighting {
                vehicle_id: Some("30001".to_string()),
                last_report_time: Some("garbage".to_string()),
                ..Default::default()
            },
            VehicleSighting {
                vehicle_id: None,
                last_report_time: Some("20250314083015".to_string()),
                ..Default::default()
            },
            VehicleSighting {
                vehicle_id: Some(String::new()),
                last_report_time: Some("20250314083015".to_string()),
                ..Default::default()
            },
            sighting("30002", ts(2025, 3, 14, 8, 30)),
        ];

        let stats = log.reconcile(&batch);

        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.created, 1);
        assert_eq!(log.len(), 1);
        assert!(log.get("30002").is_some());
    }

    #[test]
    fn parse_log_file() {
        let contents = r#"{
            "30042": ["01.02.2024 06:10:00", "14.03.2025 08:30:15", "Ime Busa"],
            "70007": ["05.05.2024 12:00:00", "06.05.2024 13:00:00", "Solaris Urbino"]
        }"#;
        let log = FleetLog::from_json(contents);

        assert_eq!(log.len(), 2);
        let entry = log.get("30042").unwrap();
        assert_eq!(entry.first_seen, ts(2024, 2, 1, 6, 10));
        assert_eq!(log.display_name("30042"), None);
        assert_eq!(log.display_name("70007"), Some("Solaris Urbino"));
    }

    #[test]
    fn corrupt_log_is_empty() {
        assert!(FleetLog::from_json("{ not json").is_empty());
        assert!(FleetLog::from_json("[1, 2, 3]").is_empty());
        assert!(FleetLog::from_json("").is_empty());
    }

    #[test]
    fn invalid_utf8_log_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flota.json");
        std::fs::write(&path, b"{\"30100\": [\"\xff\xfe\"]}").unwrap();

        assert!(FleetLog::load(&path).unwrap().is_empty());
    }

    #[test]
    fn unreadable_entries_are_dropped() {
        let contents = r#"{
            "30042": ["01.02.2024 06:10:00", "14.03.2025 08:30:15", "Ime Busa"],
            "30043": ["yesterday", "14.03.2025 08:30:15", "Ime Busa"],
            "30044": ["01.02.2024 06:10:00"]
        }"#;
        let log = FleetLog::from_json(contents);

        assert_eq!(log.len(), 1);
        assert!(log.get("30042").is_some());
    }

    #[test]
    fn saved_log_is_sorted_by_last_seen() {
        let mut log = FleetLog::default();
        log.reconcile(&[
            sighting("30001", ts(2025, 1, 1, 8, 0)),
            sighting("30002", ts(2025, 3, 1, 8, 0)),
            sighting("70003", ts(2025, 2, 1, 8, 0)),
        ]);

        let json = log.to_json().unwrap();
        let positions: Vec<usize> = ["30002", "70003", "30001"]
            .iter()
            .map(|id| json.find(&format!("\"{id}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");

        assert!(json.contains("    \"30002\": [\n        \"01.03.2025 08:00:00\""));
    }

    #[test]
    fn non_ascii_names_are_written_verbatim() {
        let mut log = FleetLog::default();
        log.reconcile(&[sighting("70007", ts(2025, 1, 1, 8, 0))]);
        log.entries.get_mut("70007").unwrap().display_name = "Vulović Šabac".to_string();

        let json = log.to_json().unwrap();
        assert!(json.contains("Vulović Šabac"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flota.json");

        let missing = FleetLog::load(&path).unwrap();
        assert!(missing.is_empty());

        let mut log = FleetLog::default();
        log.reconcile(&[
            sighting("30042", ts(2025, 3, 14, 8, 30)),
            sighting("12345", ts(2024, 7, 1, 23, 59)),
        ]);
        log.save(&path).unwrap();

        let loaded = FleetLog::load(&path).unwrap();
        assert_eq!(loaded, log);
    }
}
