use crate::{
    db::{
        errors::Result,
        models::bids::{BidCreateDBRequest, BoostBid},
    },
    types::{BidId, Locale, Placement, UserId},
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

const BID_COLUMNS: &str = r#"
    id, user_id, placement, locale, bid_amount_credits, auction_window_start,
    status, auto_rollover, rollover_count, started_at, ends_at, created_at, updated_at
"#;

/// Bid persistence. Creation happens at submission time; every later
/// mutation is a targeted-by-id, from-state-conditional transition so that
/// concurrent or repeated clearing passes are naturally idempotent.
pub struct Bids<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Bids<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a new pending bid. The partial unique index on
    /// (user, placement, locale, window) where status = 'pending' rejects a
    /// second bid for the same window; the 23505 surfaces as
    /// `DbError::UniqueViolation` for the submission layer to translate.
    pub async fn create(&mut self, request: &BidCreateDBRequest) -> Result<BoostBid> {
        let bid = sqlx::query_as::<_, BoostBid>(&format!(
            r#"
            INSERT INTO boost_bids
                (user_id, placement, locale, bid_amount_credits, auction_window_start, auto_rollover)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {BID_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.placement)
        .bind(request.locale)
        .bind(request.bid_amount_credits)
        .bind(request.auction_window_start)
        .bind(request.auto_rollover)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(bid)
    }

    pub async fn get(&mut self, id: BidId) -> Result<Option<BoostBid>> {
        let bid = sqlx::query_as::<_, BoostBid>(&format!("SELECT {BID_COLUMNS} FROM boost_bids WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(bid)
    }

    /// All bids still pending for one (locale, placement, window) triple —
    /// the candidate set of a clearing pass.
    pub async fn pending_for_window(
        &mut self,
        locale: Locale,
        placement: Placement,
        window_start: DateTime<Utc>,
    ) -> Result<Vec<BoostBid>> {
        let bids = sqlx::query_as::<_, BoostBid>(&format!(
            r#"
            SELECT {BID_COLUMNS}
            FROM boost_bids
            WHERE locale = $1 AND placement = $2 AND auction_window_start = $3 AND status = 'pending'
            "#
        ))
        .bind(locale)
        .bind(placement)
        .bind(window_start)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(bids)
    }

    /// Whether the user already holds a pending bid in this window. The
    /// unique index is authoritative; this read lets submission fail early
    /// with a typed conflict instead of an insert error in the common case.
    pub async fn pending_exists(
        &mut self,
        user_id: UserId,
        placement: Placement,
        locale: Locale,
        window_start: DateTime<Utc>,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM boost_bids
                WHERE user_id = $1 AND placement = $2 AND locale = $3
                  AND auction_window_start = $4 AND status = 'pending'
            )
            "#,
        )
        .bind(user_id)
        .bind(placement)
        .bind(locale)
        .bind(window_start)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(exists)
    }

    /// pending -> active. Returns false if the bid was already moved out of
    /// pending by another clearing run.
    pub async fn activate(&mut self, id: BidId, started_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE boost_bids
            SET status = 'active', started_at = $2, ends_at = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(started_at)
        .bind(ends_at)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// pending -> refunded. No credits were taken for a pending bid, so this
    /// releases the expectation rather than reversing a charge.
    pub async fn refund(&mut self, id: BidId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE boost_bids
            SET status = 'refunded', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Re-target a losing pending bid at the next window, keeping it
    /// pending and counting the hop.
    pub async fn rollover(&mut self, id: BidId, next_window_start: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE boost_bids
            SET auction_window_start = $2, rollover_count = rollover_count + 1, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(next_window_start)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// active -> expired for every boost in the (locale, placement) whose
    /// run has ended. Returns how many were reaped.
    pub async fn expire_stale(&mut self, locale: Locale, placement: Placement, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE boost_bids
            SET status = 'expired', updated_at = NOW()
            WHERE locale = $1 AND placement = $2 AND status = 'active' AND ends_at <= $3
            "#,
        )
        .bind(locale)
        .bind(placement)
        .bind(now)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// A user's bids, most recent first. Powers the listing API.
    pub async fn list_for_user(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<BoostBid>> {
        let bids = sqlx::query_as::<_, BoostBid>(&format!(
            r#"
            SELECT {BID_COLUMNS}
            FROM boost_bids
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            OFFSET $2
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(bids)
    }
}
