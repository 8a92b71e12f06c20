use crate::types::{Locale, Placement};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Operating parameters for one (locale, placement) auction. Read-mostly;
/// resolved once per request or clearing pass and treated as a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuctionSettings {
    pub locale: Locale,
    pub placement: Placement,
    pub enabled: bool,
    pub min_bid_credits: i64,
    pub window_minutes: i32,
    pub duration_minutes: i32,
    pub max_winners: i32,
}

impl AuctionSettings {
    /// Fail-closed defaults for an unconfigured (locale, placement): bidding
    /// disabled, parameters safe but inert.
    pub fn disabled(locale: Locale, placement: Placement) -> Self {
        Self {
            locale,
            placement,
            enabled: false,
            min_bid_credits: 1,
            window_minutes: 15,
            duration_minutes: 60,
            max_winners: 1,
        }
    }

    pub fn window_length(&self) -> Duration {
        Duration::minutes(i64::from(self.window_minutes))
    }

    pub fn boost_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}
