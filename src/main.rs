//! Bus fleet map generator

use std::time::Duration;

use bus_fleet_map::{
    config::{AppConfig, OutputConfig},
    errors::FleetMapError,
    feed::FeedClient,
    pipeline::run_cycle,
    render::MapRenderer,
};
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), FleetMapError> {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Missing credentials are fatal before any network activity
    let config = AppConfig::load()?;
    config.validate()?;

    let client = FeedClient::new(&config.feed)?;
    let renderer = MapRenderer::new(config.map.clone(), config.output.refresh_interval);

    match config.run.interval {
        None => {
            run_cycle(&client, &renderer, &config.output).await?;
        }
        Some(interval) => {
            info!("Polling every {:?}", interval);
            tokio::select! {
                _ = poll(&client, &renderer, &config.output, interval) => {}
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal");
                }
            }
        }
    }

    Ok(())
}

async fn poll(client: &FeedClient, renderer: &MapRenderer, output: &OutputConfig, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = run_cycle(client, renderer, output).await {
            error!("Update failed: {}", e);
        }
    }
}
