use crate::{
    auction::submit::{submit_bid, SubmitBidRequest},
    auth::USER_ID_HEADER,
    config::Config,
    db::{
        handlers::{Ledger, Settings},
        models::{ledger::CreditSource, settings::AuctionSettings},
    },
    types::{Locale, Placement, UserId},
};
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let router = crate::setup_app(pool, test_config(), false)
        .await
        .expect("Failed to setup test app");
    TestServer::new(router).expect("Failed to create test server")
}

pub fn test_config() -> Config {
    let database_url = std::env::var("TEST_DATABASE_URL").unwrap_or_else(|_| "postgres://postgres@localhost/test".to_string());

    Config {
        database_url,
        host: "127.0.0.1".to_string(),
        port: 0,
        clearing_tick: std::time::Duration::from_secs(1),
        enable_metrics: false,
        auction_settings: vec![],
    }
}

pub fn auth_header(user_id: UserId) -> (String, String) {
    (USER_ID_HEADER.to_string(), user_id.to_string())
}

/// Enable bidding for the pair with the fixture settings the handler tests
/// assume: 5-credit minimum, 15-minute windows, hour-long boosts, two slots.
pub async fn seed_enabled_settings(pool: &PgPool, locale: Locale, placement: Placement) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Settings::new(&mut conn)
        .upsert(&AuctionSettings {
            locale,
            placement,
            enabled: true,
            min_bid_credits: 5,
            window_minutes: 15,
            duration_minutes: 60,
            max_winners: 2,
        })
        .await
        .expect("Failed to seed settings");
}

pub async fn grant_credits(pool: &PgPool, user_id: UserId, source: CreditSource, amount: i64) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Ledger::new(&mut conn)
        .grant(user_id, source, amount, None, "test grant")
        .await
        .expect("Failed to grant credits");
}

/// Place a pending bid for the currently open window and return that
/// window's start, for tests that then clear it explicitly.
pub async fn place_bid(
    pool: &PgPool,
    user_id: UserId,
    locale: Locale,
    placement: Placement,
    bid_amount_credits: i64,
) -> DateTime<Utc> {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let outcome = submit_bid(
        &mut conn,
        &SubmitBidRequest {
            user_id,
            placement,
            locale,
            bid_amount_credits,
            auto_rollover: false,
        },
        Utc::now(),
    )
    .await
    .expect("Failed to place bid");
    outcome.bid.auction_window_start
}
