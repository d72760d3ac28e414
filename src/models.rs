//! Data models.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use serde_helpers::*;

/// Timezone in which the feed reports and the fleet log stores timestamps.
pub const REGION_TZ: Tz = chrono_tz::Europe::Belgrade;

/// Timestamp format of `LAST_GPS_TIME` in the feed.
pub const FEED_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Timestamp format used in the persisted fleet log.
pub const LOG_TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Timestamp format shown to map viewers.
pub const DISPLAY_TIME_FORMAT: &str = "%d.%m.%Y. %H:%M:%S";

/// Instant in the regional timezone.
pub type LocalTime = DateTime<Tz>;

/// Sightings older than this are archived: they are drawn on the map but
/// never touch the fleet log.
pub fn archive_cutoff() -> LocalTime {
    REGION_TZ
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("midnight of 2024-01-01 exists exactly once in Europe/Belgrade")
}

/// Current wall-clock time in the regional timezone.
pub fn local_now() -> LocalTime {
    Utc::now().with_timezone(&REGION_TZ)
}

/// Parse a naive local timestamp and attach the regional timezone.
///
/// Times repeated by a DST fold resolve to the earlier instant, times skipped
/// by a DST gap do not exist and yield `None`.
pub fn parse_local(value: &str, format: &str) -> Option<LocalTime> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), format).ok()?;
    REGION_TZ.from_local_datetime(&naive).earliest()
}

/// One raw vehicle record from the feed.
///
/// Every field is optional: the feed omits fields freely, and a missing
/// field only disqualifies the record from the steps that need it.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct VehicleSighting {
    /// Garage number, string or integer in the feed
    #[serde(rename = "BUS_ID", default, deserialize_with = "deserialize_text")]
    pub vehicle_id: Option<String>,
    /// Route code, `None` unless the feed sent a string
    #[serde(rename = "ROUTE_CODE", default, deserialize_with = "deserialize_string_only")]
    pub route_code: Option<String>,
    /// Latitude with a decimal comma, e.g. `"44,0141"`
    #[serde(rename = "LATITUDE", default, deserialize_with = "deserialize_text")]
    pub latitude: Option<String>,
    /// Longitude with a decimal comma
    #[serde(rename = "LONGITUDE", default, deserialize_with = "deserialize_text")]
    pub longitude: Option<String>,
    /// Last GPS report, `YYYYMMDDHHMMSS` local time
    #[serde(rename = "LAST_GPS_TIME", default, deserialize_with = "deserialize_text")]
    pub last_report_time: Option<String>,
}

impl VehicleSighting {
    /// Vehicle id, if present and non-empty
    pub fn id(&self) -> Option<&str> {
        self.vehicle_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Parsed `last_report_time`, `None` if missing or malformed
    pub fn reported_at(&self) -> Option<LocalTime> {
        parse_local(self.last_report_time.as_deref()?, FEED_TIME_FORMAT)
    }
}

/// Bus operator, derived from the garage number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Garage numbers starting with `30`
    Strela,
    /// Garage numbers starting with `70`
    Vulovic,
    Unknown,
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Strela => "Strela Obrenovac",
            Operator::Vulovic => "Vulović Transport",
            Operator::Unknown => "Nepoznat prevoznik",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operator and the operator's internal fleet number for a vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleIdentity {
    pub operator: Operator,
    pub internal_number: String,
}

impl VehicleIdentity {
    /// Split a garage number into operator and internal number.
    ///
    /// Known operators prefix their internal number with a two-digit code;
    /// anything else keeps the whole id as its internal number.
    pub fn from_vehicle_id(vehicle_id: &str) -> Self {
        let operator = if vehicle_id.starts_with("30") {
            Operator::Strela
        } else if vehicle_id.starts_with("70") {
            Operator::Vulovic
        } else {
            Operator::Unknown
        };

        let internal_number = match operator {
            Operator::Unknown => vehicle_id.to_string(),
            _ => vehicle_id[2..].to_string(),
        };

        Self {
            operator,
            internal_number,
        }
    }
}

/// Recency bucket of a sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityTier {
    /// Reported within the last 10 minutes
    Active0to10,
    /// Reported 10 to 60 minutes ago
    Active10to60,
    /// Reported 1 to 24 hours ago
    Inactive1to24h,
    /// Reported more than 24 hours ago, but after the archive cutoff
    InactiveOver24h,
    /// Reported before the archive cutoff
    Archived,
}

impl ActivityTier {
    pub const ALL: [ActivityTier; 5] = [
        ActivityTier::Active0to10,
        ActivityTier::Active10to60,
        ActivityTier::Inactive1to24h,
        ActivityTier::InactiveOver24h,
        ActivityTier::Archived,
    ];

    /// Stable identifier, used as a key in the rendered page
    pub fn key(&self) -> &'static str {
        match self {
            ActivityTier::Active0to10 => "active",
            ActivityTier::Active10to60 => "mid",
            ActivityTier::Inactive1to24h => "day",
            ActivityTier::InactiveOver24h => "old",
            ActivityTier::Archived => "archive",
        }
    }

    /// Layer name shown in the map legend
    pub fn label(&self) -> &'static str {
        match self {
            ActivityTier::Active0to10 => "Aktivna (0–10 min)",
            ActivityTier::Active10to60 => "Aktivna (10–60 min)",
            ActivityTier::Inactive1to24h => "Neaktivna (1–24h)",
            ActivityTier::InactiveOver24h => "Neaktivna (>24h)",
            ActivityTier::Archived => "Arhiva (pre 2024)",
        }
    }

    /// Marker color
    pub fn color(&self) -> &'static str {
        match self {
            ActivityTier::Active0to10 => "#2ecc40",
            ActivityTier::Active10to60 => "#1b7f2a",
            ActivityTier::Inactive1to24h => "#ff851b",
            ActivityTier::InactiveOver24h => "#aaaaaa",
            ActivityTier::Archived => "#111111",
        }
    }

    /// Whether the tier's layer is switched on when the page loads
    pub fn shown_by_default(&self) -> bool {
        !matches!(
            self,
            ActivityTier::InactiveOver24h | ActivityTier::Archived
        )
    }
}

/// WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// A sighting that passed classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedVehicle {
    pub vehicle_id: String,
    pub identity: VehicleIdentity,
    /// Route code as reported, for display next to the line number
    pub route_code: String,
    pub line_number: String,
    pub position: Position,
    pub last_seen: LocalTime,
    pub activity_tier: ActivityTier,
}

/// Custom deserializers
mod serde_helpers {
    use serde::{self, Deserialize, Deserializer};

    /// Accept a string or a number, keeping its textual form. Any other
    /// shape (null, bool, object, array) is treated as missing.
    pub fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Accept any value, but only keep strings
    pub fn deserialize_string_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Some(s),
            _ => None,
        })
    }
}
