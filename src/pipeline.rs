//! One update cycle: fetch, classify, reconcile, persist, render.

use tracing::{error, info, warn};

use crate::{
    classify::{classify_batch, TierCounts},
    config::OutputConfig,
    errors::FleetMapError,
    feed::FeedClient,
    fleet_log::{FleetLog, ReconcileStats},
    models::{local_now, LocalTime, VehicleSighting},
    render::MapRenderer,
    storage::write_atomic,
};

/// What a cycle produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub counts: TierCounts,
    pub reconcile: ReconcileStats,
    /// False when the fleet log could not be read or written
    pub log_saved: bool,
}

/// Fetch the feed and regenerate the fleet log and map.
///
/// A failed fetch returns before any file is touched.
pub async fn run_cycle(
    client: &FeedClient,
    renderer: &MapRenderer,
    output: &OutputConfig,
) -> Result<CycleOutcome, FleetMapError> {
    let sightings = client.fetch().await?;
    update_outputs(&sightings, renderer, output, local_now())
}

/// Regenerate the fleet log and map from an already fetched batch.
///
/// The log is saved before the map is rendered. A log that cannot be
/// read is left alone, and a log that cannot be saved is only reported: the
/// map is still drawn from the in-memory log.
pub fn update_outputs(
    sightings: &[VehicleSighting],
    renderer: &MapRenderer,
    output: &OutputConfig,
    now: LocalTime,
) -> Result<CycleOutcome, FleetMapError> {
    if sightings.is_empty() {
        return Err(FleetMapError::EmptyFeed);
    }

    let vehicles = classify_batch(sightings, now);
    let counts = TierCounts::from_vehicles(&vehicles);

    let (mut log, log_readable) = match FleetLog::load(&output.log_path) {
        Ok(log) => (log, true),
        Err(e) => {
            error!(
                "Could not read fleet log {}, it will not be updated: {}",
                output.log_path.display(),
                e
            );
            (FleetLog::default(), false)
        }
    };

    let reconcile = log.reconcile(sightings);
    info!(
        "Fleet log: {} new, {} updated, {} archived, {} skipped",
        reconcile.created, reconcile.updated, reconcile.archived, reconcile.skipped
    );

    let log_saved = log_readable
        && match log.save(&output.log_path) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save fleet log: {}", e);
                false
            }
        };

    let html = renderer.render(&vehicles, &log, now)?;
    write_atomic(&output.map_path, html.as_bytes())?;
    info!(
        "Map written to {} with {} vehicles ({} active, {} 10-60 min, {} 1-24h, {} 24h+, {} archived)",
        output.map_path.display(),
        counts.total(),
        counts.active,
        counts.mid,
        counts.day,
        counts.old,
        counts.archive
    );

    Ok(CycleOutcome {
        counts,
        reconcile,
        log_saved,
    })
}
