//! Fleet map page.
//!
//! The page is a static Leaflet document. Everything that comes from the
//! feed or the fleet log is embedded as one JSON object and turned into DOM
//! nodes with `textContent`, so vehicle data is never parsed as HTML.

use std::time::Duration;

use serde::Serialize;

use crate::classify::TierCounts;
use crate::config::MapConfig;
use crate::errors::FleetMapError;
use crate::fleet_log::FleetLog;
use crate::models::{ActivityTier, ClassifiedVehicle, LocalTime, DISPLAY_TIME_FORMAT};

const TEMPLATE: &str = include_str!("map.html");

#[derive(Debug, Serialize)]
struct PageData<'a> {
    view: View,
    updated: String,
    tiers: Vec<TierData>,
    vehicles: Vec<Marker<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct View {
    lat: f64,
    lon: f64,
    zoom: u8,
    max_zoom: u8,
}

#[derive(Debug, Serialize)]
struct TierData {
    key: &'static str,
    label: &'static str,
    color: &'static str,
    shown: bool,
    count: usize,
}

#[derive(Debug, Serialize)]
struct Marker<'a> {
    id: &'a str,
    operator: &'static str,
    internal: &'a str,
    line: &'a str,
    route: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    lat: f64,
    lon: f64,
    seen: String,
    tier: &'static str,
}

/// Renders classified vehicles into a self-refreshing HTML map
#[derive(Debug, Clone)]
pub struct MapRenderer {
    view: MapConfig,
    refresh_interval: Duration,
}

impl MapRenderer {
    pub fn new(view: MapConfig, refresh_interval: Duration) -> Self {
        Self {
            view,
            refresh_interval,
        }
    }

    pub fn render(
        &self,
        vehicles: &[ClassifiedVehicle],
        log: &FleetLog,
        generated_at: LocalTime,
    ) -> Result<String, FleetMapError> {
        let counts = TierCounts::from_vehicles(vehicles);

        let data = PageData {
            view: View {
                lat: self.view.center_lat,
                lon: self.view.center_lon,
                zoom: self.view.zoom,
                max_zoom: self.view.max_zoom,
            },
            updated: generated_at.format(DISPLAY_TIME_FORMAT).to_string(),
            tiers: ActivityTier::ALL
                .iter()
                .map(|tier| TierData {
                    key: tier.key(),
                    label: tier.label(),
                    color: tier.color(),
                    shown: tier.shown_by_default(),
                    count: counts.get(*tier),
                })
                .collect(),
            vehicles: vehicles
                .iter()
                .map(|vehicle| Marker {
                    id: &vehicle.vehicle_id,
                    operator: vehicle.identity.operator.name(),
                    internal: &vehicle.identity.internal_number,
                    line: &vehicle.line_number,
                    route: &vehicle.route_code,
                    name: log.display_name(&vehicle.vehicle_id),
                    lat: vehicle.position.lat,
                    lon: vehicle.position.lon,
                    seen: vehicle.last_seen.format(DISPLAY_TIME_FORMAT).to_string(),
                    tier: vehicle.activity_tier.key(),
                })
                .collect(),
        };

        // "</" would let feed content close the script element
        let json = serde_json::to_string(&data)?.replace("</", "<\\/");

        Ok(TEMPLATE
            .replace(
                "__REFRESH_SECONDS__",
                &self.refresh_interval.as_secs().to_string(),
            )
            .replace("__PAGE_DATA__", &json))
    }
}
