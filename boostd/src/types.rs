use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type BidId = Uuid;
pub type LedgerEntryId = Uuid;

/// The ledger feature all boost-auction credits live under.
pub const BOOST_CREDITS_FEATURE: &str = "boost_credits";

/// Operating region an auction runs in. Settings are configured per
/// (locale, placement) pair; an unconfigured pair is fail-closed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    West,
    East,
    Central,
}

/// The visibility slot being auctioned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Spotlight,
    Travel,
    Event,
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::West => write!(f, "west"),
            Locale::East => write!(f, "east"),
            Locale::Central => write!(f, "central"),
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Spotlight => write!(f, "spotlight"),
            Placement::Travel => write!(f, "travel"),
            Placement::Event => write!(f, "event"),
        }
    }
}
