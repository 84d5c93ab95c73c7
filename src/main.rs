mod engine;
mod error;
mod models;
mod sources;

use engine::{Criteria, PollScheduler};
use models::EngineEvent;
use sources::{SagaAdapter, SourceAdapter, SourceConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🏠 Flatwatch - new apartment offer watcher");
    info!("==========================================");

    let criteria = Criteria::from_env()?;
    info!(
        min_rooms = criteria.min_rooms,
        min_area = criteria.min_area,
        max_rent = criteria.max_rent,
        interval = ?criteria.poll_interval,
        "Criteria loaded"
    );

    let saga = SagaAdapter::new(SourceConfig::saga())?;
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(saga)];

    let (event_tx, mut events) = mpsc::unbounded_channel();
    // SAGA resolves one detail page per offer inside a single fetch, so
    // give each adapter a generous window.
    let handle = PollScheduler::new(adapters, criteria, event_tx)
        .with_fetch_timeout(Duration::from_secs(45))
        .spawn();
    handle.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, stopping");
                handle.stop();
                break;
            }
            event = events.recv() => match event {
                Some(event) => {
                    if let EngineEvent::CycleCompleted { result, .. } = &event {
                        // Snapshot for inspection between runs
                        let json = serde_json::to_string_pretty(result)?;
                        tokio::fs::write("latest_cycle.json", json).await?;
                    }
                    render(event);
                }
                None => break,
            },
        }
    }

    Ok(())
}

/// Stand-in for the presentation/notification collaborators: render each
/// cycle to stdout and log the rest.
fn render(event: EngineEvent) {
    match event {
        EngineEvent::CycleCompleted {
            result,
            completed_at,
        } => {
            println!();
            println!(
                "Last update: {} ({} offers, {} new)",
                completed_at.format("%H:%M:%S"),
                result.listings.len(),
                result.new_count
            );
            for listing in &result.listings {
                let marker = if listing.is_new { "  [NEW]" } else { "" };
                println!("{}. {}{}", listing.index + 1, listing.title, marker);
                println!(
                    "   {} | {} Zimmer, {} m², {} € | {}",
                    listing.street,
                    listing.rooms,
                    listing.area_sqm,
                    listing.rent,
                    listing.provider.as_str()
                );
                println!("   {}", listing.external_link);
            }
        }
        EngineEvent::NewMatches { count } => {
            info!(count, "🔔 New offers matching your criteria");
        }
        EngineEvent::CycleFailed { reason, failed_at } => {
            warn!(%reason, at = %failed_at.format("%H:%M:%S"), "Update failed, will retry");
        }
        EngineEvent::ViewUpdated { result } => {
            info!(offers = result.listings.len(), "Criteria changed, view refreshed");
        }
    }
}
