//! Console entry points for the sync and connectivity-test commands.

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::read_model::MetroDataService;
use crate::wmata::WmataClient;

/// Runs the full sync and prints a count table plus any per-line errors.
/// With `validate`, reports cache integrity first but proceeds either way.
pub async fn run_sync(service: &MetroDataService, validate: bool) -> Result<()> {
    if validate {
        info!("checking cache integrity");

        if service.validate_cache_integrity() {
            info!("cache is valid");
        } else {
            warn!("cache validation failed, proceeding with sync");
        }
    }

    info!("starting Metro data synchronization");

    let results = service.sync().await;

    println!("{:<22} {:>8}", "Type", "Count");
    println!("{:<22} {:>8}", "Lines synced", results.lines);
    println!("{:<22} {:>8}", "Stations synced", results.stations);
    println!("{:<22} {:>8}", "Path entries synced", results.paths);

    if !results.is_success() {
        println!("Errors encountered:");
        for error in &results.errors {
            println!("  - {error}");
        }
        bail!("sync finished with {} errors", results.errors.len());
    }

    println!("Metro data sync completed successfully");

    Ok(())
}

/// One lines fetch as a connectivity check, plus the hourly request usage.
pub async fn run_test_connection(client: &WmataClient) -> Result<()> {
    info!("testing WMATA API connection");

    let lines = client
        .get_lines()
        .await
        .context("Failed to connect to WMATA API")?;

    println!("Successfully connected to WMATA API");
    println!("Found {} metro lines", lines.len());
    println!(
        "Rate limit status: {}/{} requests this hour",
        client.limiter().current_count(),
        client.limiter().max_requests_per_hour()
    );

    Ok(())
}
