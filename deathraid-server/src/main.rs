mod events;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use tracing::{error, info, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use anyhow::Context;
use rustls::crypto::ring::default_provider;
use sqlx::postgres::PgPoolOptions;

use deathraid_claims::ClaimsHook;
use deathraid_core::scheduler::DEFAULT_SWEEP_INTERVAL;
use deathraid_core::{DeathRaidCoordinator, ProtectionGateway, Scheduler, Settings};
use deathraid_database::{Database, MIGRATOR};
use deathraid_utils::formatting::format_compact_duration;
use deathraid_utils::time::now_unix_secs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter_fn(|metadata| {
        let target = metadata.target();

        let within_info_level = *metadata.level() <= tracing::Level::INFO;
        if !within_info_level {
            return false;
        }

        !(target.starts_with("sqlx::query")
            || target.starts_with("hyper")
            || target.starts_with("reqwest"))
    }));

    tracing_subscriber::registry().with(fmt_layer).init();

    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls ring provider"))?;

    // Load the .env file
    dotenvy::dotenv().ok();

    info!("DeathRaid loading...");

    let db = connect_database().await?;
    info!(backend = db.backend_name(), "persistence ready.");

    let claims = ClaimsHook::from_env()?;
    if let ClaimsHook::Local(_) = &claims {
        warn!("CLAIMS_URL is not set; protections are tracked in-process only.");
    }
    if claims.initialize().await {
        info!(kind = claims.kind(), "claims integration successful!");
    } else {
        warn!(kind = claims.kind(), "claims integration failed! Protection changes will be retried.");
    }

    let coordinator = Arc::new(DeathRaidCoordinator::new(db, claims, Settings::default()));

    let now = now_unix_secs();
    let summary = coordinator
        .load(now)
        .await
        .context("failed to load death raid data; refusing to start over stored state")?;
    info!(
        death_records = summary.death_records,
        raid_windows = summary.raid_windows,
        expired_windows = summary.expired_windows,
        "death raid data loaded."
    );

    let reconciled = coordinator.reconcile_protections(now).await;
    if !reconciled.is_empty() {
        info!(
            reconciled = reconciled.reconciled.len(),
            failed = reconciled.failed.len(),
            "open raid windows reconciled with claims."
        );
    }

    let config = coordinator.settings().snapshot();
    info!(
        death_threshold = config.death_threshold,
        raid_duration = %format_compact_duration(config.raid_duration_secs()),
        "DeathRaid started successfully!"
    );

    let sweep_interval = env_u64("SWEEP_INTERVAL_SECONDS", DEFAULT_SWEEP_INTERVAL.as_secs()).max(1);
    let scheduler = Scheduler::start(Arc::clone(&coordinator), Duration::from_secs(sweep_interval));

    let (stop_ingestion, ingestion_shutdown) = watch::channel(false);
    let mut ingestion = tokio::spawn(events::death::ingest_stdin(
        Arc::clone(&coordinator),
        ingestion_shutdown,
    ));

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(source) = signal {
                error!(?source, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received.");

            // Stop reading and wait for in-flight events before the final save.
            let _ = stop_ingestion.send(true);
            ingestion.await
        }
        result = &mut ingestion => result,
    };
    match result {
        Ok(Ok(())) => info!("death event stream closed."),
        Ok(Err(source)) => error!(?source, "death event stream failed"),
        Err(source) => error!(?source, "death event task ended abnormally"),
    }

    info!("Shutting down DeathRaid...");
    scheduler.shutdown().await;
    coordinator.shutdown().await;
    info!("DeathRaid shutdown complete.");

    Ok(())
}

async fn connect_database() -> anyhow::Result<Database> {
    let store = env::var("DEATHRAID_STORE").unwrap_or_else(|_| "json".to_string());

    match store.trim().to_ascii_lowercase().as_str() {
        "postgres" => {
            let database_url = env::var("DATABASE_URL")?;
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            info!("PostgreSQL connection established.");

            if env_bool("AUTO_RUN_MIGRATIONS", true) {
                MIGRATOR.run(&pool).await?;
                info!("Database migrations applied.");
            } else {
                info!("Auto migrations disabled (set AUTO_RUN_MIGRATIONS=true to run at startup).");
            }

            Ok(Database::postgres(pool))
        }
        "memory" => {
            warn!("DEATHRAID_STORE=memory; nothing survives a restart.");
            Ok(Database::memory(Default::default()))
        }
        "json" => {
            let data_dir = env::var("DEATHRAID_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
            info!(data_dir = %data_dir, "JSON snapshots enabled.");
            Ok(Database::json(data_dir))
        }
        other => Err(anyhow::anyhow!(
            "unknown DEATHRAID_STORE `{other}` (expected postgres, json or memory)"
        )),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}
