//! Tiered storage and multi-level cache data plane — binary entry point.
//!
//! Wires the in-process default adapters to the [`TieredStorageEngine`]
//! and [`MultiLevelCache`], starts their background schedulers (periodic
//! migration, retention enforcement, predictive/scheduled cache
//! warm-up), and exposes a small operational HTTP surface
//! (`/healthz`, `/readyz`, `/stats`).

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tiered_storage_core::cache::{
    CacheWarmer, InvalidationManager, MultiLevelCache, WarmSource, WarmerStats,
};
use tiered_storage_core::config::{
    BackupConfig, CacheConfig, ColdConfig, HotConfig, InvalidationConfig, MigrationConfig,
    TieredStorageConfig, WarmConfig, WarmingConfig, WarmingStrategy,
};
use tiered_storage_core::domain::ports::{InMemoryKeyValueStore, InMemoryStructuredStore};
use tiered_storage_core::lifecycle::AccessPatternTracker;
use tiered_storage_core::retention::RetentionPolicyEngine;
use tiered_storage_core::tiered::{MigrationScheduler, TieredStorageEngine};
use tiered_storage_core::{Error, Result, SystemClock};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tiered storage engine and multi-level cache data plane.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Operational HTTP surface bind address (health/readiness/stats).
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8080")]
    http_addr: String,

    /// HOT tier key-value TTL in seconds (data-type default overrides this).
    #[arg(long, env = "HOT_TTL_SECONDS", default_value = "3600")]
    hot_ttl_seconds: u64,

    /// HOT tier item capacity.
    #[arg(long, env = "HOT_MAX_ITEMS", default_value = "100000")]
    hot_max_items: usize,

    /// WARM tier retention window in days.
    #[arg(long, env = "WARM_RETENTION_DAYS", default_value = "90")]
    warm_retention_days: u32,

    /// COLD tier retention window in days.
    #[arg(long, env = "COLD_RETENTION_DAYS", default_value = "365")]
    cold_retention_days: u32,

    /// Enable compression for COLD-tier values.
    #[arg(long, env = "COLD_COMPRESSION_ENABLED", default_value = "true")]
    cold_compression_enabled: bool,

    /// BACKUP tier retention window in days.
    #[arg(long, env = "BACKUP_RETENTION_DAYS", default_value = "2555")]
    backup_retention_days: u32,

    /// Migration pass interval in minutes.
    #[arg(long, env = "MIGRATION_INTERVAL_MINUTES", default_value = "15")]
    migration_interval_minutes: u64,

    /// Maximum candidates examined per migration pass.
    #[arg(long, env = "MIGRATION_BATCH_SIZE", default_value = "100")]
    migration_batch_size: usize,

    /// Retention sweep interval in minutes.
    #[arg(long, env = "RETENTION_INTERVAL_MINUTES", default_value = "60")]
    retention_interval_minutes: u64,

    /// L1 cache capacity (entries).
    #[arg(long, env = "CACHE_L1_MAX_SIZE", default_value = "1000")]
    cache_l1_max_size: usize,

    /// Enable predictive cache warming.
    #[arg(long, env = "CACHE_PREDICTIVE_ENABLED", default_value = "true")]
    cache_predictive_enabled: bool,

    /// Predictive warm-up pass interval in seconds.
    #[arg(long, env = "WARMER_PREDICTIVE_INTERVAL_SECONDS", default_value = "30")]
    warmer_predictive_interval_secs: u64,

    /// Poll interval in seconds for checking scheduled warm-up cadences.
    /// Each [`tiered_storage_core::cache::WarmUpSchedule`] tracks its own
    /// due time, so this only needs to be finer-grained than the
    /// shortest configured schedule.
    #[arg(long, env = "WARMER_SCHEDULE_POLL_INTERVAL_SECONDS", default_value = "30")]
    warmer_schedule_poll_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Application wiring
// =============================================================================

/// Fetches a value straight from the tiered engine, promoting through
/// the cache's own read path implicitly via `MultiLevelCache::get`'s
/// caller. This is the cache's upstream source of truth on a full miss.
struct TieredWarmSource {
    engine: Arc<TieredStorageEngine>,
}

#[async_trait::async_trait]
impl WarmSource for TieredWarmSource {
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.engine.retrieve(key).await
    }
}

#[derive(Clone)]
struct AppState {
    engine: Arc<TieredStorageEngine>,
    cache: Arc<MultiLevelCache>,
    warmer: Arc<CacheWarmer>,
    invalidation: Arc<InvalidationManager>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("starting tiered storage core v{}", tiered_storage_core::VERSION);

    let clock = Arc::new(SystemClock);

    let tiered_config = TieredStorageConfig {
        hot: HotConfig {
            enabled: true,
            ttl_seconds: args.hot_ttl_seconds,
            max_items: args.hot_max_items,
        },
        warm: WarmConfig {
            enabled: true,
            retention_days: args.warm_retention_days,
        },
        cold: ColdConfig {
            enabled: true,
            retention_days: args.cold_retention_days,
            compression_enabled: args.cold_compression_enabled,
            use_object_store: false,
        },
        backup: BackupConfig {
            enabled: true,
            retention_days: args.backup_retention_days,
            schedule_cron: format!("*/{} * * * *", 24 * 60),
        },
        migration: MigrationConfig {
            enabled: true,
            interval_minutes: args.migration_interval_minutes,
            batch_size: args.migration_batch_size,
        },
    };

    let tracker = Arc::new(AccessPatternTracker::new(clock.clone()));
    let retention = Arc::new(RetentionPolicyEngine::new(clock.clone()));

    let engine = Arc::new(TieredStorageEngine::new(
        tiered_config,
        clock.clone(),
        Arc::new(InMemoryKeyValueStore::new()),
        Some(Arc::new(InMemoryStructuredStore::new())),
        Some(Arc::new(InMemoryStructuredStore::new())),
        None,
        Some(Arc::new(InMemoryStructuredStore::new())),
        tracker,
        retention,
    ));

    let cache_config = CacheConfig {
        l1_max_size: args.cache_l1_max_size,
        predictive_enabled: args.cache_predictive_enabled,
        ..Default::default()
    };
    let cache = Arc::new(MultiLevelCache::new(
        clock.clone(),
        cache_config,
        Some(Arc::new(InMemoryKeyValueStore::new())),
        Some(Arc::new(InMemoryStructuredStore::new())),
        false,
    ));

    let invalidation = Arc::new(InvalidationManager::new(
        cache.clone(),
        InvalidationConfig::default(),
        None,
    ));

    let warming_config = WarmingConfig {
        strategy: WarmingStrategy::Predictive,
        predictive_enabled: args.cache_predictive_enabled,
        ..Default::default()
    };
    let warmer = Arc::new(CacheWarmer::new(
        cache.clone(),
        Arc::new(TieredWarmSource { engine: engine.clone() }),
        warming_config,
        clock.clone(),
    ));

    let migration_scheduler = MigrationScheduler::start(
        engine.clone(),
        Duration::from_secs(args.migration_interval_minutes * 60),
    );

    let retention_handle = spawn_retention_loop(
        engine.clone(),
        Duration::from_secs(args.retention_interval_minutes * 60),
    );

    let warmer_handle = spawn_predictive_warm_loop(
        warmer.clone(),
        Duration::from_secs(args.warmer_predictive_interval_secs),
    );

    let scheduled_warm_handle = spawn_scheduled_warm_loop(
        warmer.clone(),
        Duration::from_secs(args.warmer_schedule_poll_interval_secs),
    );

    let state = AppState { engine, cache, warmer, invalidation };
    let app = build_router(state);

    let addr: SocketAddr = args
        .http_addr
        .parse()
        .map_err(|e| Error::Configuration(format!("invalid HTTP bind address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind HTTP surface: {e}")))?;

    info!(%addr, "operational HTTP surface listening");
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = serve_result {
        error!(error = %e, "HTTP surface error");
    }

    info!("shutting down background schedulers");
    migration_scheduler.shutdown().await;
    retention_handle.abort();
    warmer_handle.abort();
    scheduled_warm_handle.abort();

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn spawn_retention_loop(engine: Arc<TieredStorageEngine>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match engine.enforce_retention_policies().await {
                Ok(report) if !report.errors.is_empty() => {
                    tracing::warn!(errors = ?report.errors, "retention sweep completed with errors");
                }
                Ok(report) => {
                    tracing::debug!(
                        deleted = report.deleted,
                        archived = report.archived,
                        moved = report.moved,
                        "retention sweep completed"
                    );
                }
                Err(e) => tracing::error!(error = %e, "retention sweep failed"),
            }
        }
    })
}

fn spawn_predictive_warm_loop(warmer: Arc<CacheWarmer>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            warmer.warm_predictive().await;
        }
    })
}

/// Polls registered [`tiered_storage_core::cache::WarmUpSchedule`]s at a
/// fixed cadence; each schedule tracks its own due time internally and
/// reschedules itself once it fires, so this poll interval only bounds
/// how finely schedule cadences can be observed, not the cadences
/// themselves.
fn spawn_scheduled_warm_loop(warmer: Arc<CacheWarmer>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            warmer.run_due_schedules().await;
        }
    })
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// HTTP surface
// =============================================================================

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/livez", get(healthz))
        .route("/readyz", get(readyz))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz() -> &'static str {
    "ok"
}

async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let tier_stats = state.engine.get_statistics();
    let analytics = state.cache.analytics();
    let warmer_stats: WarmerStats = state.warmer.stats();
    let invalidation_events = state.invalidation.history().len();

    let per_tier: serde_json::Map<String, serde_json::Value> = tier_stats
        .per_tier
        .iter()
        .map(|(tier, count)| {
            (
                tier.to_string(),
                serde_json::json!({ "items": count.items, "bytes": count.bytes }),
            )
        })
        .collect();

    Json(serde_json::json!({
        "version": tiered_storage_core::VERSION,
        "tiers": per_tier,
        "migrations_total": tier_stats.migrations_total,
        "migrations_succeeded": tier_stats.migrations_succeeded,
        "cache": {
            "total_requests": analytics.total_requests(),
            "total_hits": analytics.total_hits(),
            "hit_rate": analytics.hit_rate(),
            "avg_latency_micros": analytics.avg_latency().as_micros(),
        },
        "warmer": {
            "total": warmer_stats.total,
            "success": warmer_stats.success,
            "failure": warmer_stats.failure,
            "avg_warmup_time_ms": warmer_stats.avg_warmup_time_ms,
        },
        "invalidation": {
            "history_len": invalidation_events,
        },
    }))
}
