use crate::{
    db::models::ledger::{CreditSource, LedgerEntry},
    types::{LedgerEntryId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// Request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GrantCreate {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub source: CreditSource,
    /// Number of credits to grant, must be positive
    pub quantity: i64,
    /// Optional expiry; unexpired-only buckets count toward balance
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form reason recorded in the bucket's audit trail
    pub reason: Option<String>,
}

// Response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GrantResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub source: CreditSource,
    pub quantity: i64,
    /// The user's spendable balance after the grant
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub feature_key: String,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: LedgerEntryId,
    pub source: CreditSource,
    pub quantity_granted: i64,
    pub remaining: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing ledger buckets
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListLedgerQuery {
    /// Number of items to skip
    pub skip: Option<i64>,

    /// Maximum number of items to return
    pub limit: Option<i64>,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            source: entry.source,
            quantity_granted: entry.quantity_granted,
            remaining: entry.remaining,
            expires_at: entry.expires_at,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}
