use crate::{
    db::models::bids::{BidStatus, BoostBid},
    types::{BidId, Locale, Placement, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn default_false() -> bool {
    false
}

// Request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BidSubmit {
    pub placement: Placement,
    pub locale: Locale,
    /// Sealed bid amount in whole boost credits
    pub bid_amount_credits: i64,
    /// Carry this bid into the next window automatically if it loses
    #[serde(default = "default_false")]
    pub auto_rollover: bool,
}

// Response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BidResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BidId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub placement: Placement,
    pub locale: Locale,
    pub bid_amount_credits: i64,
    pub auction_window_start: DateTime<Utc>,
    pub status: BidStatus,
    pub auto_rollover: bool,
    pub rollover_count: i32,
    /// Set once the bid wins and the boost activates
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Submission result: the pending bid plus the boost timings the caller
/// would get on a win, and their current balance for display.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BidSubmitResponse {
    pub bid: BidResponse,
    pub boost_starts_at: DateTime<Utc>,
    pub boost_ends_at: DateTime<Utc>,
    pub available_credits: i64,
}

/// Query parameters for listing the caller's bids
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListBidsQuery {
    /// Number of items to skip
    pub skip: Option<i64>,

    /// Maximum number of items to return
    pub limit: Option<i64>,
}

impl From<BoostBid> for BidResponse {
    fn from(bid: BoostBid) -> Self {
        Self {
            id: bid.id,
            user_id: bid.user_id,
            placement: bid.placement,
            locale: bid.locale,
            bid_amount_credits: bid.bid_amount_credits,
            auction_window_start: bid.auction_window_start,
            status: bid.status,
            auto_rollover: bid.auto_rollover,
            rollover_count: bid.rollover_count,
            started_at: bid.started_at,
            ends_at: bid.ends_at,
            created_at: bid.created_at,
        }
    }
}
