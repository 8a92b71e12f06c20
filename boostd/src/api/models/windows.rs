use crate::{
    auction::clearing::ClearingSummary,
    types::{BidId, Locale, Placement},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request to clear one auction window by hand. When `window_start` is
/// omitted the most recent closed window for the pair is cleared.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearWindowRequest {
    pub locale: Locale,
    pub placement: Placement,
    pub window_start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearWindowResponse {
    pub locale: Locale,
    pub placement: Placement,
    pub window_start: DateTime<Utc>,
    #[schema(value_type = Vec<String>)]
    pub activated: Vec<BidId>,
    #[schema(value_type = Vec<String>)]
    pub refunded: Vec<BidId>,
    #[schema(value_type = Vec<String>)]
    pub rolled_over: Vec<BidId>,
    pub expired: u64,
    pub settings_disabled: bool,
}

impl From<ClearingSummary> for ClearWindowResponse {
    fn from(summary: ClearingSummary) -> Self {
        Self {
            locale: summary.locale,
            placement: summary.placement,
            window_start: summary.window_start,
            activated: summary.activated,
            refunded: summary.refunded,
            rolled_over: summary.rolled_over,
            expired: summary.expired,
            settings_disabled: summary.settings_disabled,
        }
    }
}
