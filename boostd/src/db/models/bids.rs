use crate::types::{BidId, Locale, Placement, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Bid lifecycle. Bids are created `pending`, settled by window clearing to
/// `active` or `refunded` (or re-targeted at the next window, staying
/// `pending`), and `active` bids become `expired` once their boost runs out.
/// Rows are never deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Pending,
    Active,
    Refunded,
    Expired,
}

/// One sealed bid for a boost placement slot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BoostBid {
    pub id: BidId,
    pub user_id: UserId,
    pub placement: Placement,
    pub locale: Locale,
    pub bid_amount_credits: i64,
    pub auction_window_start: DateTime<Utc>,
    pub status: BidStatus,
    pub auto_rollover: bool,
    pub rollover_count: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database request for creating a new pending bid.
#[derive(Debug, Clone)]
pub struct BidCreateDBRequest {
    pub user_id: UserId,
    pub placement: Placement,
    pub locale: Locale,
    pub bid_amount_credits: i64,
    pub auction_window_start: DateTime<Utc>,
    pub auto_rollover: bool,
}
