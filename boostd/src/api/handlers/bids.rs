use crate::{
    api::models::bids::{BidResponse, BidSubmit, BidSubmitResponse, ListBidsQuery},
    auction::submit::{submit_bid, SubmitBidRequest},
    auth::CurrentUser,
    db::handlers::Bids,
    errors::{Error, Result},
    types::BidId,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;

/// Submit a sealed bid for the currently open window
#[utoipa::path(
    post,
    path = "/bids",
    tag = "bids",
    summary = "Submit a bid",
    description = "Place a sealed bid for the caller in the currently open auction window. No credits are debited until the bid wins at clearing time.",
    request_body = BidSubmit,
    responses(
        (status = 201, description = "Bid accepted and pending", body = BidSubmitResponse),
        (status = 400, description = "Bad request - non-positive amount or bid below the configured minimum"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Auction disabled for this locale and placement"),
        (status = 409, description = "Caller already has a pending bid for this window"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Boostd-User" = [])
    )
)]
pub async fn submit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(data): Json<BidSubmit>,
) -> Result<(StatusCode, Json<BidSubmitResponse>)> {
    let mut conn = state.db.acquire().await?;

    let outcome = submit_bid(
        &mut conn,
        &SubmitBidRequest {
            user_id: current_user.id,
            placement: data.placement,
            locale: data.locale,
            bid_amount_credits: data.bid_amount_credits,
            auto_rollover: data.auto_rollover,
        },
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(BidSubmitResponse {
            bid: BidResponse::from(outcome.bid),
            boost_starts_at: outcome.boost_starts_at,
            boost_ends_at: outcome.boost_ends_at,
            available_credits: outcome.available_credits,
        }),
    ))
}

/// Fetch one of the caller's bids
#[utoipa::path(
    get,
    path = "/bids/{bid_id}",
    tag = "bids",
    summary = "Get a bid",
    description = "Fetch a single bid by id. Only the caller's own bids are visible; anyone else's look like they don't exist.",
    params(
        ("bid_id" = uuid::Uuid, Path, description = "Bid id")
    ),
    responses(
        (status = 200, description = "The bid", body = BidResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such bid for this caller"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Boostd-User" = [])
    )
)]
pub async fn get(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bid_id): Path<BidId>,
) -> Result<Json<BidResponse>> {
    let mut conn = state.db.acquire().await?;

    let bid = Bids::new(&mut conn)
        .get(bid_id)
        .await?
        .filter(|bid| bid.user_id == current_user.id)
        .ok_or_else(|| Error::NotFound {
            resource: "Bid".to_string(),
            id: bid_id.to_string(),
        })?;

    Ok(Json(BidResponse::from(bid)))
}

/// List the caller's bids
#[utoipa::path(
    get,
    path = "/bids",
    tag = "bids",
    summary = "List the caller's bids",
    description = "Get the caller's bids across all windows and statuses, newest first.",
    params(
        ListBidsQuery
    ),
    responses(
        (status = 200, description = "List of bids", body = [BidResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Boostd-User" = [])
    )
)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListBidsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<BidResponse>>> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);

    let mut conn = state.db.acquire().await?;
    let bids = Bids::new(&mut conn).list_for_user(current_user.id, skip, limit).await?;

    Ok(Json(bids.into_iter().map(BidResponse::from).collect()))
}
