use crate::{
    api::models::credits::{BalanceResponse, GrantCreate, GrantResponse, LedgerEntryResponse, ListLedgerQuery},
    auth::CurrentUser,
    db::handlers::Ledger,
    errors::Result,
    types::BOOST_CREDITS_FEATURE,
    AppState,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};

/// Grant credits to a user
#[utoipa::path(
    post,
    path = "/credits/grants",
    tag = "credits",
    summary = "Grant boost credits",
    description = "Grant credits to a user from one of the ledger sources. Repeated grants from the same source accumulate into one bucket with an appended audit record. This is an admin surface, fronted by the deployment's proxy.",
    request_body = GrantCreate,
    responses(
        (status = 201, description = "Credits granted", body = GrantResponse),
        (status = 400, description = "Bad request - non-positive quantity"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Boostd-User" = [])
    )
)]
pub async fn grant(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(data): Json<GrantCreate>,
) -> Result<(StatusCode, Json<GrantResponse>)> {
    let mut conn = state.db.acquire().await?;
    let reason = data.reason.as_deref().unwrap_or("manual grant");

    let balance = Ledger::new(&mut conn)
        .grant(data.user_id, data.source, data.quantity, data.expires_at, reason)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GrantResponse {
            user_id: data.user_id,
            source: data.source,
            quantity: data.quantity,
            balance,
        }),
    ))
}

/// Get the caller's spendable balance
#[utoipa::path(
    get,
    path = "/credits/balance",
    tag = "credits",
    summary = "Get spendable balance",
    description = "Sum of remaining credits across the caller's unexpired buckets.",
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Boostd-User" = [])
    )
)]
pub async fn balance(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<BalanceResponse>> {
    let mut conn = state.db.acquire().await?;
    let balance = Ledger::new(&mut conn).get_balance(current_user.id).await?;

    Ok(Json(BalanceResponse {
        user_id: current_user.id,
        feature_key: BOOST_CREDITS_FEATURE.to_string(),
        balance,
    }))
}

/// List the caller's ledger buckets
#[utoipa::path(
    get,
    path = "/credits/ledger",
    tag = "credits",
    summary = "List ledger buckets",
    description = "The caller's per-source credit buckets, including exhausted and expired ones, in spend order.",
    params(
        ListLedgerQuery
    ),
    responses(
        (status = 200, description = "Ledger buckets", body = [LedgerEntryResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Boostd-User" = [])
    )
)]
pub async fn ledger(
    State(state): State<AppState>,
    Query(query): Query<ListLedgerQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<LedgerEntryResponse>>> {
    let skip = query.skip.unwrap_or(0).max(0) as usize;
    let limit = query.limit.unwrap_or(100).min(1000).max(0) as usize;

    let mut conn = state.db.acquire().await?;
    let entries = Ledger::new(&mut conn).list_entries(current_user.id).await?;

    Ok(Json(
        entries.into_iter().skip(skip).take(limit).map(LedgerEntryResponse::from).collect(),
    ))
}
