mod api;
mod auction;
mod auth;
mod config;
mod db;
mod errors;
mod openapi;
mod scheduler;
mod types;

#[cfg(test)]
mod test_utils;

use crate::{openapi::ApiDoc, scheduler::ClearingScheduler};
use axum::{
    http::{Request, Response},
    routing::{get, post},
    Router,
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use clap::Parser;
use config::{Args, Config};
use sqlx::PgPool;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, instrument, Span};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

pub use types::{BidId, LedgerEntryId, UserId};

#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Seed auction settings from configuration (run only once). After the
/// first boot the settings table is owned by operators; the seed never
/// overwrites their edits.
pub async fn seed_settings(settings: &[db::models::settings::AuctionSettings], db: &PgPool) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;

    let seeded = sqlx::query_scalar::<_, bool>("SELECT value FROM system_config WHERE key = 'settings_seeded'")
        .fetch_optional(&mut *tx)
        .await?;

    if let Some(true) = seeded {
        info!("Settings already seeded, skipping");
        tx.commit().await?;
        return Ok(());
    }

    info!(count = settings.len(), "Seeding auction settings");

    {
        let mut repo = db::handlers::Settings::new(&mut tx);
        for entry in settings {
            repo.upsert(entry).await?;
        }
    }

    sqlx::query("UPDATE system_config SET value = TRUE, updated_at = NOW() WHERE key = 'settings_seeded'")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    debug!("Auction settings seeded");
    Ok(())
}

/// Background task for leader election.
///
/// Window clearing must run on exactly one replica, so every replica tries
/// to take a Postgres advisory lock on an interval. The one that succeeds
/// starts the clearing scheduler and keeps a dedicated connection open;
/// advisory locks are session-based, so losing the connection loses the
/// lock, and the scheduler is stopped until leadership is re-acquired.
#[instrument(skip(pool, config, lock_id))]
async fn leader_election_task(pool: PgPool, config: Config, lock_id: i64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    let mut leader_conn: Option<sqlx::pool::PoolConnection<sqlx::Postgres>> = None;
    let mut scheduler_token: Option<CancellationToken> = None;

    loop {
        interval.tick().await;

        match leader_conn {
            None => match pool.acquire().await {
                Ok(mut conn) => {
                    match sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
                        .bind(lock_id)
                        .fetch_one(&mut *conn)
                        .await
                    {
                        Ok(true) => {
                            info!("Gained leadership");
                            leader_conn = Some(conn);

                            let token = CancellationToken::new();
                            scheduler_token = Some(token.clone());
                            let scheduler = ClearingScheduler::new(pool.clone(), config.clone());
                            tokio::spawn(scheduler.run(token));
                        }
                        Ok(false) => {
                            debug!("Following - will retry");
                        }
                        Err(e) => {
                            tracing::error!("Failed to check leader lock: {e}");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to acquire connection for leader election: {e}");
                }
            },
            Some(ref mut conn) => {
                // Ping the connection; if it died the advisory lock is gone
                // and another replica may already be leading.
                if let Err(e) = sqlx::query("SELECT 1").execute(&mut **conn).await {
                    tracing::warn!("Lost leadership (connection died): {e}");
                    leader_conn = None;
                    if let Some(token) = scheduler_token.take() {
                        token.cancel();
                    }
                } else {
                    debug!("Leadership renewed (connection alive)");
                }
            }
        }
    }
}

/// Setup the complete application: seed settings, optionally start leader
/// election for the clearing scheduler, and build the router. Tests pass
/// `start_scheduler = false` and drive clearing explicitly.
#[instrument(skip(pool, config))]
pub async fn setup_app(pool: PgPool, config: Config, start_scheduler: bool) -> anyhow::Result<Router> {
    debug!("Setting up application");
    seed_settings(&config.auction_settings, &pool).await?;

    if start_scheduler {
        // Advisory lock id for the clearing leader; spelled out so it is
        // recognizable in pg_locks.
        const LEADER_LOCK_ID: i64 = 0x424F_4F53_5444_434C_i64; // "BOOSTDCL"

        info!("Starting leader election for the clearing scheduler");
        tokio::spawn(leader_election_task(pool.clone(), config.clone(), LEADER_LOCK_ID));
    }

    let state = AppState::builder().db(pool).config(config).build();
    build_router(state)
}

pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/bids", post(api::handlers::bids::submit))
        .route("/bids", get(api::handlers::bids::list))
        .route("/bids/{bid_id}", get(api::handlers::bids::get))
        .route("/credits/grants", post(api::handlers::credits::grant))
        .route("/credits/balance", get(api::handlers::credits::balance))
        .route("/credits/ledger", get(api::handlers::credits::ledger))
        .route("/windows/clear", post(api::handlers::windows::clear))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = %response.status(),
                        latency = ?latency,
                        "request completed"
                    );
                }),
        )
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/docs"))
        .layer(CorsLayer::permissive());

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    Ok(router)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    debug!("{:?}", args);

    let config = Config::load(&args)?;
    debug!("Starting boostd with configuration: {:#?}", config);

    let pool = PgPool::connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let router = setup_app(pool, config.clone(), true).await?;

    let bind_addr = config.bind_address();
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("boostd listening on http://{bind_addr}");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[cfg(test)]
mod test {
    use super::AppState;
    use crate::{
        db::{handlers::Settings, models::settings::AuctionSettings},
        test_utils::*,
        types::{Locale, Placement},
    };
    use sqlx::PgPool;

    fn sample_settings(min_bid_credits: i64) -> AuctionSettings {
        AuctionSettings {
            locale: Locale::West,
            placement: Placement::Spotlight,
            enabled: true,
            min_bid_credits,
            window_minutes: 15,
            duration_minutes: 60,
            max_winners: 1,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_settings_seeding_behavior(pool: PgPool) {
        // First seed writes the configured settings.
        super::seed_settings(&[sample_settings(5)], &pool)
            .await
            .expect("First seeding should succeed");

        let mut conn = pool.acquire().await.unwrap();
        let stored = Settings::new(&mut conn)
            .get(Locale::West, Placement::Spotlight)
            .await
            .unwrap()
            .expect("Settings should exist after seeding");
        assert_eq!(stored.min_bid_credits, 5);

        // Operator edits after the first boot are preserved: a re-seed with
        // different values must not apply.
        super::seed_settings(&[sample_settings(50)], &pool)
            .await
            .expect("Second seeding should succeed but skip");

        let mut conn = pool.acquire().await.unwrap();
        let stored = Settings::new(&mut conn)
            .get(Locale::West, Placement::Spotlight)
            .await
            .unwrap()
            .expect("Settings should still exist");
        assert_eq!(stored.min_bid_credits, 5, "Re-seed must not overwrite settings");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_setup_app_integration(pool: PgPool) {
        let app = create_test_app(pool).await;

        let health = app.get("/healthz").await;
        assert_eq!(health.status_code().as_u16(), 200);
        assert_eq!(health.text(), "OK");

        // API routes exist and require the user header.
        let bids = app.get("/api/v1/bids").await;
        assert_eq!(bids.status_code().as_u16(), 401);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_openapi_doc_is_served(pool: PgPool) {
        let app = create_test_app(pool).await;

        let response = app.get("/api-docs/openapi.json").await;
        assert_eq!(response.status_code().as_u16(), 200);
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/bids"].is_object());
        assert!(doc["paths"]["/windows/clear"].is_object());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_build_router_with_metrics_enabled(pool: PgPool) {
        let mut config = test_config();
        config.enable_metrics = true;

        let state = AppState::builder().db(pool).config(config).build();
        let router = super::build_router(state).expect("Failed to build router");
        let server = axum_test::TestServer::new(router).expect("Failed to create test server");

        let _ = server.get("/healthz").await;
        let metrics = server.get("/internal/metrics").await;
        assert_eq!(metrics.status_code().as_u16(), 200);
        let content = metrics.text();
        assert!(content.contains("# HELP") || content.contains("# TYPE"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_build_router_with_metrics_disabled(pool: PgPool) {
        let state = AppState::builder().db(pool).config(test_config()).build();
        let router = super::build_router(state).expect("Failed to build router");
        let server = axum_test::TestServer::new(router).expect("Failed to create test server");

        let metrics = server.get("/internal/metrics").await;
        assert_eq!(metrics.status_code().as_u16(), 404);
    }
}
