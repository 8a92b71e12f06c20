use crate::{
    db::models::ledger::{AuditEntry, CreditSource, LedgerEntry},
    errors::{Error, Result},
    types::{LedgerEntryId, UserId, BOOST_CREDITS_FEATURE},
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection};
use tracing::trace;

/// Multi-source credit ledger. The only writer of `remaining`; all spend
/// ordering and the scan-then-decide debit protocol live here.
pub struct Ledger<'c> {
    db: &'c mut PgConnection,
}

/// Per-bucket decrements a debit will apply, computed in full against a
/// single consistent read before any write is issued.
#[derive(Debug, PartialEq)]
pub struct DebitPlan {
    pub takes: Vec<(LedgerEntryId, i64)>,
    pub available: i64,
}

/// Walk `entries` (already in spend order) covering `amount`. Fails with the
/// cumulative available balance when the buckets come up short; no bucket is
/// touched in that case.
pub fn plan_debit(entries: &[LedgerEntry], amount: i64) -> std::result::Result<DebitPlan, i64> {
    let available: i64 = entries.iter().map(|e| e.remaining).sum();
    if available < amount {
        return Err(available);
    }

    let mut takes = Vec::new();
    let mut outstanding = amount;
    for entry in entries {
        if outstanding == 0 {
            break;
        }
        let take = entry.remaining.min(outstanding);
        if take > 0 {
            takes.push((entry.id, take));
            outstanding -= take;
        }
    }

    Ok(DebitPlan { takes, available })
}

// Advisory lock key for serializing one user's ledger writes: the first 8
// bytes of the user UUID.
fn user_lock_key(user_id: UserId) -> i64 {
    let bytes = user_id.as_bytes();
    i64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

impl<'c> Ledger<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Grant `amount` credits from `source` to the user, upserting the
    /// (user, feature, source) bucket. Returns the new total balance.
    /// Idempotency is the caller's concern; there is no deduplication key.
    pub async fn grant(
        &mut self,
        user_id: UserId,
        source: CreditSource,
        amount: i64,
        expires_at: Option<DateTime<Utc>>,
        reason: &str,
    ) -> Result<i64> {
        if amount <= 0 {
            return Err(Error::Validation {
                message: format!("grant amount must be a positive integer, got {amount}"),
            });
        }

        let audit_entry = serde_json::to_value(AuditEntry {
            at: Utc::now(),
            delta: amount,
            reason: reason.to_string(),
        })
        .map_err(|e| Error::Validation {
            message: format!("failed to serialize audit entry: {e}"),
        })?;

        let mut tx = self.db.begin().await?;

        sqlx::query_scalar::<_, i32>("SELECT 1 FROM (SELECT pg_advisory_xact_lock($1)) AS _")
            .bind(user_lock_key(user_id))
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (user_id, feature_key, source, quantity_granted, remaining, expires_at, audit)
            VALUES ($1, $2, $3, $4, $4, $6, jsonb_build_array($5::jsonb))
            ON CONFLICT (user_id, feature_key, source)
            DO UPDATE SET
                quantity_granted = ledger_entries.quantity_granted + $4,
                remaining = ledger_entries.remaining + $4,
                expires_at = COALESCE($6, ledger_entries.expires_at),
                audit = ledger_entries.audit || $5::jsonb,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(BOOST_CREDITS_FEATURE)
        .bind(source)
        .bind(amount)
        .bind(&audit_entry)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        let new_balance = balance_of(&mut *tx, user_id).await?;
        tx.commit().await?;

        trace!(%user_id, ?source, amount, new_balance, "granted credits");
        Ok(new_balance)
    }

    /// Debit `amount` credits across the user's buckets in spend-priority
    /// order. Atomic: either every planned decrement applies, or the call
    /// fails with `InsufficientCredits` and nothing changes.
    pub async fn debit(&mut self, user_id: UserId, amount: i64, reason: &str) -> Result<i64> {
        if amount <= 0 {
            return Err(Error::Validation {
                message: format!("debit amount must be a positive integer, got {amount}"),
            });
        }

        let mut tx = self.db.begin().await?;

        sqlx::query_scalar::<_, i32>("SELECT 1 FROM (SELECT pg_advisory_xact_lock($1)) AS _")
            .bind(user_lock_key(user_id))
            .fetch_one(&mut *tx)
            .await?;

        trace!(%user_id, "acquired ledger lock");

        // Single consistent read of every spendable bucket; the plan is
        // computed in full before any write.
        let mut entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, feature_key, source, quantity_granted, remaining,
                   expires_at, audit, created_at, updated_at
            FROM ledger_entries
            WHERE user_id = $1 AND feature_key = $2 AND remaining > 0
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(user_id)
        .bind(BOOST_CREDITS_FEATURE)
        .fetch_all(&mut *tx)
        .await?;

        entries.sort_by(|a, b| a.spend_order(b));

        let plan = plan_debit(&entries, amount).map_err(|available| Error::InsufficientCredits {
            requested: amount,
            available,
        })?;

        for (entry_id, take) in &plan.takes {
            let audit_entry = serde_json::to_value(AuditEntry {
                at: Utc::now(),
                delta: -take,
                reason: reason.to_string(),
            })
            .map_err(|e| Error::Validation {
                message: format!("failed to serialize audit entry: {e}"),
            })?;

            sqlx::query(
                r#"
                UPDATE ledger_entries
                SET remaining = remaining - $2,
                    audit = audit || $3::jsonb,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(entry_id)
            .bind(take)
            .bind(&audit_entry)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let new_balance = plan.available - amount;
        trace!(%user_id, amount, new_balance, "debited credits");
        Ok(new_balance)
    }

    /// Current spendable balance: sum of `remaining` over unexpired buckets.
    /// Never negative by the ledger invariant.
    pub async fn get_balance(&mut self, user_id: UserId) -> Result<i64> {
        balance_of(&mut *self.db, user_id).await
    }

    /// All of the user's buckets for the feature, in spend order. Used by
    /// the ledger inspection API.
    pub async fn list_entries(&mut self, user_id: UserId) -> Result<Vec<LedgerEntry>> {
        let mut entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, user_id, feature_key, source, quantity_granted, remaining,
                   expires_at, audit, created_at, updated_at
            FROM ledger_entries
            WHERE user_id = $1 AND feature_key = $2
            "#,
        )
        .bind(user_id)
        .bind(BOOST_CREDITS_FEATURE)
        .fetch_all(&mut *self.db)
        .await?;

        entries.sort_by(|a, b| a.spend_order(b));
        Ok(entries)
    }
}

async fn balance_of(conn: &mut PgConnection, user_id: UserId) -> Result<i64> {
    let balance = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(remaining), 0)::BIGINT
        FROM ledger_entries
        WHERE user_id = $1 AND feature_key = $2
          AND (expires_at IS NULL OR expires_at > NOW())
        "#,
    )
    .bind(user_id)
    .bind(BOOST_CREDITS_FEATURE)
    .fetch_one(conn)
    .await?;

    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use sqlx::types::Json;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn mem_entry(source: CreditSource, remaining: i64, created_secs: i64) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            feature_key: BOOST_CREDITS_FEATURE.to_string(),
            source,
            quantity_granted: remaining,
            remaining,
            expires_at: None,
            audit: Json(vec![]),
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
            updated_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        }
    }

    #[test]
    fn plan_covers_across_buckets_in_order() {
        let referral = mem_entry(CreditSource::Referral, 3, 0);
        let subscription = mem_entry(CreditSource::Subscription, 5, 0);
        let entries = vec![referral.clone(), subscription.clone()];

        let plan = plan_debit(&entries, 4).expect("plan should cover");
        assert_eq!(plan.available, 8);
        assert_eq!(plan.takes, vec![(referral.id, 3), (subscription.id, 1)]);
    }

    #[test]
    fn plan_fails_without_partial_takes_when_short() {
        let entries = vec![mem_entry(CreditSource::Referral, 3, 0)];
        assert_eq!(plan_debit(&entries, 4), Err(3));
    }

    #[test]
    fn plan_skips_nothing_when_exact() {
        let entries = vec![mem_entry(CreditSource::Referral, 4, 0)];
        let plan = plan_debit(&entries, 4).expect("exact amount covers");
        assert_eq!(plan.takes.len(), 1);
        assert_eq!(plan.takes[0].1, 4);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn grant_rejects_non_positive_amounts(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut ledger = Ledger::new(&mut conn);
        let user_id = Uuid::new_v4();

        for bad in [0, -5] {
            let result = ledger.grant(user_id, CreditSource::Admin, bad, None, "test").await;
            assert!(matches!(result, Err(Error::Validation { .. })));
        }
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn grant_upserts_same_bucket(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut ledger = Ledger::new(&mut conn);
        let user_id = Uuid::new_v4();

        assert_eq!(ledger.grant(user_id, CreditSource::Referral, 3, None, "signup").await.unwrap(), 3);
        assert_eq!(ledger.grant(user_id, CreditSource::Referral, 2, None, "friend joined").await.unwrap(), 5);

        let entries = ledger.list_entries(user_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity_granted, 5);
        assert_eq!(entries[0].remaining, 5);
        assert_eq!(entries[0].audit.0.len(), 2);
        assert_eq!(entries[0].audit.0[0].delta, 3);
        assert_eq!(entries[0].audit.0[1].delta, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn debit_consumes_by_source_priority(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut ledger = Ledger::new(&mut conn);
        let user_id = Uuid::new_v4();

        ledger.grant(user_id, CreditSource::Subscription, 5, None, "monthly").await.unwrap();
        ledger.grant(user_id, CreditSource::Referral, 3, None, "signup").await.unwrap();

        let new_balance = ledger.debit(user_id, 4, "boost_bid").await.unwrap();
        assert_eq!(new_balance, 4);

        let entries = ledger.list_entries(user_id).await.unwrap();
        let referral = entries.iter().find(|e| e.source == CreditSource::Referral).unwrap();
        let subscription = entries.iter().find(|e| e.source == CreditSource::Subscription).unwrap();
        assert_eq!(referral.remaining, 0, "referral bucket drained first");
        assert_eq!(subscription.remaining, 4, "subscription covers the rest");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn insufficient_debit_mutates_nothing(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut ledger = Ledger::new(&mut conn);
        let user_id = Uuid::new_v4();

        ledger.grant(user_id, CreditSource::Referral, 3, None, "signup").await.unwrap();
        ledger.grant(user_id, CreditSource::Promotion, 2, None, "campaign").await.unwrap();

        let result = ledger.debit(user_id, 6, "boost_bid").await;
        match result {
            Err(Error::InsufficientCredits { requested, available }) => {
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            other => panic!("expected InsufficientCredits, got {other:?}"),
        }

        // Scan-then-decide: no bucket was partially drained.
        let entries = ledger.list_entries(user_id).await.unwrap();
        assert!(entries.iter().all(|e| e.remaining == e.quantity_granted));
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), 5);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn balance_never_negative_under_interleaving(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut ledger = Ledger::new(&mut conn);
        let user_id = Uuid::new_v4();

        ledger.grant(user_id, CreditSource::Admin, 10, None, "seed").await.unwrap();
        ledger.debit(user_id, 4, "spend").await.unwrap();
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), 6);

        ledger.grant(user_id, CreditSource::Event, 1, None, "attended").await.unwrap();
        ledger.debit(user_id, 7, "spend").await.unwrap();
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), 0);

        assert!(matches!(
            ledger.debit(user_id, 1, "spend").await,
            Err(Error::InsufficientCredits { available: 0, .. })
        ));
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn expired_buckets_are_not_spendable(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut ledger = Ledger::new(&mut conn);
        let user_id = Uuid::new_v4();

        let past = Utc::now() - Duration::hours(1);
        ledger.grant(user_id, CreditSource::Promotion, 5, Some(past), "campaign").await.unwrap();
        ledger.grant(user_id, CreditSource::Subscription, 2, None, "monthly").await.unwrap();

        assert_eq!(ledger.get_balance(user_id).await.unwrap(), 2);
        assert!(matches!(
            ledger.debit(user_id, 3, "spend").await,
            Err(Error::InsufficientCredits { available: 2, .. })
        ));
        assert_eq!(ledger.debit(user_id, 2, "spend").await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn source_priority_dominates_expiry(pool: PgPool) {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut ledger = Ledger::new(&mut conn);
        let user_id = Uuid::new_v4();

        ledger.grant(user_id, CreditSource::Promotion, 4, None, "evergreen").await.unwrap();

        let soon = Utc::now() + Duration::minutes(5);
        ledger.grant(user_id, CreditSource::Subscription, 4, Some(soon), "monthly").await.unwrap();

        // Priority still dominates expiry: promotion (priority 1) is drained
        // before the expiring subscription bucket (priority 4).
        ledger.debit(user_id, 5, "spend").await.unwrap();

        let entries = ledger.list_entries(user_id).await.unwrap();
        let promotion = entries.iter().find(|e| e.source == CreditSource::Promotion).unwrap();
        let subscription = entries.iter().find(|e| e.source == CreditSource::Subscription).unwrap();
        assert_eq!(promotion.remaining, 0);
        assert_eq!(subscription.remaining, 3);
    }

    /// Concurrent debits against one user must never over-spend: the
    /// advisory lock serializes plans, so the sum of successful debits
    /// cannot exceed the granted total.
    #[sqlx::test]
    #[test_log::test]
    async fn concurrent_debits_never_overdraw(pool: PgPool) {
        use std::sync::Arc;
        use tokio::task;

        let user_id = Uuid::new_v4();
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut ledger = Ledger::new(&mut conn);
        ledger.grant(user_id, CreditSource::Admin, 50, None, "seed").await.unwrap();
        drop(conn);

        let pool = Arc::new(pool);
        let mut handles = vec![];
        for _ in 0..20 {
            let pool = Arc::clone(&pool);
            handles.push(task::spawn(async move {
                let mut conn = pool.acquire().await.expect("Failed to acquire connection");
                let mut ledger = Ledger::new(&mut conn);
                ledger.debit(user_id, 5, "race").await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.expect("Task panicked") {
                successes += 1;
            }
        }

        // Exactly 10 debits of 5 fit into 50.
        assert_eq!(successes, 10);

        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut ledger = Ledger::new(&mut conn);
        assert_eq!(ledger.get_balance(user_id).await.unwrap(), 0);
    }
}
