use crate::{
    api::models::windows::{ClearWindowRequest, ClearWindowResponse},
    auction::{clearing, settings, window},
    auth::CurrentUser,
    errors::Result,
    AppState,
};
use axum::{extract::State, response::Json};
use chrono::Utc;

/// Clear one auction window by hand
#[utoipa::path(
    post,
    path = "/windows/clear",
    tag = "windows",
    summary = "Clear an auction window",
    description = "Run one clearing pass for a (locale, placement) pair. Defaults to the most recent closed window. Clearing is idempotent, so re-running after a crash or alongside the scheduler is safe.",
    request_body = ClearWindowRequest,
    responses(
        (status = 200, description = "Clearing summary", body = ClearWindowResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Boostd-User" = [])
    )
)]
pub async fn clear(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(data): Json<ClearWindowRequest>,
) -> Result<Json<ClearWindowResponse>> {
    let window_start = match data.window_start {
        Some(start) => start,
        None => {
            let mut conn = state.db.acquire().await?;
            let settings = settings::resolve(&mut conn, data.locale, data.placement).await?;
            // For a disabled pair the window length is a placeholder; the
            // clearing pass itself no-ops on disabled settings.
            window::last_closed_window(Utc::now(), settings.window_minutes)
        }
    };

    let summary = clearing::clear_window(&state.db, data.locale, data.placement, window_start).await?;
    Ok(Json(ClearWindowResponse::from(summary)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::models::ledger::CreditSource,
        test_utils::*,
        types::{Locale, Placement},
    };
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    #[sqlx::test]
    #[test_log::test]
    async fn manual_clear_activates_funded_winner(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        seed_enabled_settings(&pool, Locale::West, Placement::Spotlight).await;
        let operator = Uuid::new_v4();
        let bidder = Uuid::new_v4();

        grant_credits(&pool, bidder, CreditSource::Admin, 50).await;
        let window_start = place_bid(&pool, bidder, Locale::West, Placement::Spotlight, 10).await;

        let response = app
            .post("/api/v1/windows/clear")
            .add_header(auth_header(operator).0, auth_header(operator).1)
            .json(&json!({
                "locale": "west",
                "placement": "spotlight",
                "window_start": window_start
            }))
            .await;

        response.assert_status_ok();
        let summary: ClearWindowResponse = response.json();
        assert_eq!(summary.activated.len(), 1);
        assert!(summary.refunded.is_empty());
        assert!(!summary.settings_disabled);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn manual_clear_without_window_start_targets_last_closed(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        seed_enabled_settings(&pool, Locale::West, Placement::Spotlight).await;
        let operator = Uuid::new_v4();

        // No bids for the last closed window; the pass runs and reports
        // an empty summary rather than failing.
        let response = app
            .post("/api/v1/windows/clear")
            .add_header(auth_header(operator).0, auth_header(operator).1)
            .json(&json!({
                "locale": "west",
                "placement": "spotlight"
            }))
            .await;

        response.assert_status_ok();
        let summary: ClearWindowResponse = response.json();
        assert!(summary.activated.is_empty());
        assert!(summary.refunded.is_empty());
        assert!(summary.rolled_over.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn manual_clear_of_disabled_pair_is_a_no_op(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let operator = Uuid::new_v4();

        let response = app
            .post("/api/v1/windows/clear")
            .add_header(auth_header(operator).0, auth_header(operator).1)
            .json(&json!({
                "locale": "east",
                "placement": "event"
            }))
            .await;

        response.assert_status_ok();
        let summary: ClearWindowResponse = response.json();
        assert!(summary.settings_disabled);
        assert!(summary.activated.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn manual_clear_requires_auth(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/windows/clear")
            .json(&json!({
                "locale": "west",
                "placement": "spotlight"
            }))
            .await;

        response.assert_status_unauthorized();
    }
}
