use crate::types::{LedgerEntryId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::cmp::Ordering;
use utoipa::ToSchema;

/// Where a bucket of credits came from. The discriminants double as spend
/// priority: referral credits are consumed before promotion credits, and so
/// on down to credits won back from past auctions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CreditSource {
    Referral,
    Promotion,
    Admin,
    Event,
    Subscription,
    Auction,
}

impl CreditSource {
    pub fn spend_priority(self) -> u8 {
        match self {
            CreditSource::Referral => 0,
            CreditSource::Promotion => 1,
            CreditSource::Admin => 2,
            CreditSource::Event => 3,
            CreditSource::Subscription => 4,
            CreditSource::Auction => 5,
        }
    }
}

/// One append-only audit record on a ledger bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub delta: i64,
    pub reason: String,
}

/// One (user, source) bucket of boost credits. A user's spendable balance is
/// the sum of `remaining` across their buckets for the feature.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub user_id: UserId,
    pub feature_key: String,
    pub source: CreditSource,
    pub quantity_granted: i64,
    pub remaining: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub audit: Json<Vec<AuditEntry>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Total order buckets are consumed in: source priority, then soonest
    /// expiry (no-expiry buckets last), then oldest grant.
    pub fn spend_order(&self, other: &Self) -> Ordering {
        self.source
            .spend_priority()
            .cmp(&other.source.spend_priority())
            .then_with(|| match (self.expires_at, other.expires_at) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.created_at.cmp(&other.created_at))
    }
}
