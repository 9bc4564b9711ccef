//! Shiptrack - AfterShip shipment tracking from the command line
//!
//! Every subcommand prints its result as JSON on stdout. Diagnostics go to
//! stderr, and failures exit nonzero with a human-readable message.

use std::path::PathBuf;

use clap::Parser;
use serde_json::{json, Value};

use shiptrack::api::{ApiClient, ListFilters, NewTracking, TrackingUpdate};
use shiptrack::cache::CacheStore;
use shiptrack::cli::{Cli, Command};
use shiptrack::config::Settings;
use shiptrack::logging;
use shiptrack::tracker::TrackerClient;

/// Namespace for all cached API responses
const CACHE_NAMESPACE: &str = "tracking";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(output) => println!("{}", output),
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    }
}

/// Dispatches the parsed command and renders its JSON result
async fn run(cli: Cli) -> Result<String, Box<dyn std::error::Error>> {
    let value = dispatch(cli).await?;
    Ok(serde_json::to_string_pretty(&value)?)
}

async fn dispatch(cli: Cli) -> Result<Value, Box<dyn std::error::Error>> {
    let Cli {
        config,
        no_cache,
        cache_dir,
        verbose: _,
        command,
    } = cli;

    // Cache administration works on the store directly, no credential needed
    match command {
        Command::CacheStats => {
            let store = open_admin_cache(&cache_dir)?;
            return Ok(serde_json::to_value(store.stats())?);
        }
        Command::CacheClear => {
            let mut store = open_admin_cache(&cache_dir)?;
            let removed = store.clear();
            return Ok(json!({ "removed": removed }));
        }
        Command::CacheInvalidate { pattern } => {
            let mut store = open_admin_cache(&cache_dir)?;
            let removed = store.invalidate(&pattern);
            return Ok(json!({ "pattern": pattern, "removed": removed }));
        }
        _ => {}
    }

    let settings = Settings::load(config.as_deref())?;
    let mut api = ApiClient::new(settings.aftership_api_key);
    if let Some(base_url) = settings.base_url {
        api = api.with_base_url(base_url);
    }

    let cache = if no_cache {
        None
    } else {
        let store = match &cache_dir {
            Some(dir) => Some(CacheStore::with_dir(dir.clone(), CACHE_NAMESPACE)),
            None => CacheStore::open(CACHE_NAMESPACE),
        };
        if store.is_none() {
            tracing::warn!("no cache directory available, running uncached");
        }
        store
    };

    let mut tracker = TrackerClient::new(api, cache);
    run_api_command(&mut tracker, command).await
}

/// Runs one API-backed subcommand against the tracking client
async fn run_api_command(
    tracker: &mut TrackerClient,
    command: Command,
) -> Result<Value, Box<dyn std::error::Error>> {
    let value = match command {
        Command::CreateTracking {
            number,
            slug,
            title,
            order_id,
            custom_fields,
        } => {
            let new = NewTracking {
                tracking_number: number,
                slug,
                title,
                order_id,
                custom_fields,
            };
            serde_json::to_value(tracker.create_tracking(&new).await?)?
        }

        Command::GetTracking { target } => {
            let id = target.to_tracking_id()?;
            serde_json::to_value(tracker.get_tracking(&id).await?)?
        }

        Command::ListTrackings {
            slug,
            tag,
            keyword,
            page,
            limit,
            created_after,
            created_before,
        } => {
            let filters = ListFilters {
                slug,
                tag,
                keyword,
                page,
                limit,
                created_at_min: created_after.map(|d| d.to_string()),
                created_at_max: created_before.map(|d| d.to_string()),
            };
            serde_json::to_value(tracker.list_trackings(&filters).await?)?
        }

        Command::UpdateTracking {
            target,
            title,
            order_id,
            custom_fields,
        } => {
            let id = target.to_tracking_id()?;
            let update = TrackingUpdate {
                title,
                order_id,
                custom_fields,
            };
            serde_json::to_value(tracker.update_tracking(&id, &update).await?)?
        }

        Command::DeleteTracking { target } => {
            let id = target.to_tracking_id()?;
            serde_json::to_value(tracker.delete_tracking(&id).await?)?
        }

        Command::Retrack { target } => {
            let id = target.to_tracking_id()?;
            serde_json::to_value(tracker.retrack(&id).await?)?
        }

        Command::MarkCompleted { target, reason } => {
            let id = target.to_tracking_id()?;
            serde_json::to_value(tracker.mark_completed(&id, &reason).await?)?
        }

        Command::DetectCourier { number } => {
            serde_json::to_value(tracker.detect_courier(&number).await?)?
        }

        Command::ListCouriers => serde_json::to_value(tracker.list_couriers().await?)?,

        Command::ListAllCouriers => serde_json::to_value(tracker.list_all_couriers().await?)?,

        Command::DelayedShipments { slug } => {
            serde_json::to_value(tracker.delayed_shipments(slug.as_deref()).await?)?
        }

        Command::ActiveShipments => serde_json::to_value(tracker.active_shipments().await?)?,

        Command::DeliveredShipments { start, end } => {
            serde_json::to_value(tracker.delivered_shipments(start, end).await?)?
        }

        Command::ResolveCarrier { number } => {
            serde_json::to_value(tracker.resolve_carrier(&number).await?)?
        }

        // Handled by the caller before the client is built
        Command::CacheStats | Command::CacheClear | Command::CacheInvalidate { .. } => {
            return Err("cache commands do not use the API".into());
        }
    };

    Ok(value)
}

/// Opens the cache store for the administrative subcommands
fn open_admin_cache(cache_dir: &Option<PathBuf>) -> Result<CacheStore, Box<dyn std::error::Error>> {
    match cache_dir {
        Some(dir) => Ok(CacheStore::with_dir(dir.clone(), CACHE_NAMESPACE)),
        None => CacheStore::open(CACHE_NAMESPACE)
            .ok_or_else(|| "could not determine a cache directory; pass --cache-dir".into()),
    }
}
