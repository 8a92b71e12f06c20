use crate::{
    auction::settings,
    db::{
        handlers::{Bids, Ledger},
        models::{bids::BoostBid, ledger::CreditSource},
    },
    errors::{Error, Result},
    types::{BidId, Locale, Placement},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use utoipa::ToSchema;

/// What one clearing pass did, consumed by the analytics/notification
/// collaborators via logs and by the operational clear endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClearingSummary {
    pub locale: Locale,
    pub placement: Placement,
    pub window_start: DateTime<Utc>,
    #[schema(value_type = Vec<String>, format = "uuid")]
    pub activated: Vec<BidId>,
    #[schema(value_type = Vec<String>, format = "uuid")]
    pub refunded: Vec<BidId>,
    #[schema(value_type = Vec<String>, format = "uuid")]
    pub rolled_over: Vec<BidId>,
    pub expired: u64,
    pub settings_disabled: bool,
}

impl ClearingSummary {
    fn disabled(locale: Locale, placement: Placement, window_start: DateTime<Utc>) -> Self {
        Self {
            locale,
            placement,
            window_start,
            activated: vec![],
            refunded: vec![],
            rolled_over: vec![],
            expired: 0,
            settings_disabled: true,
        }
    }
}

/// Deterministic winner order: amount descending, then earliest submission
/// (committing early beats last-moment bidding), then id as a final stable
/// tiebreak. Two runs over the same candidate set always agree.
pub fn rank_bids(mut bids: Vec<BoostBid>) -> Vec<BoostBid> {
    bids.sort_by(|a, b| {
        b.bid_amount_credits
            .cmp(&a.bid_amount_credits)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    bids
}

#[derive(Debug, PartialEq)]
enum WinnerOutcome {
    Activated,
    Demoted,
    AlreadySettled,
}

/// Debit and activate one provisional winner. If the bid turns out to be
/// already settled by another pass between ranking and activation, the
/// just-taken charge is returned as auction credits so the user is not
/// billed twice.
async fn settle_winner(
    conn: &mut PgConnection,
    bid: &BoostBid,
    boost_starts_at: DateTime<Utc>,
    boost_ends_at: DateTime<Utc>,
) -> Result<WinnerOutcome> {
    match Ledger::new(&mut *conn).debit(bid.user_id, bid.bid_amount_credits, "boost_bid").await {
        Ok(_) => {
            if Bids::new(&mut *conn).activate(bid.id, boost_starts_at, boost_ends_at).await? {
                Ok(WinnerOutcome::Activated)
            } else {
                warn!(bid_id = %bid.id, "bid no longer pending at activation, returning the charge");
                Ledger::new(&mut *conn)
                    .grant(bid.user_id, CreditSource::Auction, bid.bid_amount_credits, None, "clearing_reversal")
                    .await?;
                Ok(WinnerOutcome::AlreadySettled)
            }
        }
        // The balance moved between submission and clearing; this winner
        // becomes a loser, everyone else still clears.
        Err(Error::InsufficientCredits { requested, available }) => {
            info!(bid_id = %bid.id, user_id = %bid.user_id, requested, available, "winner demoted, insufficient credits");
            Ok(WinnerOutcome::Demoted)
        }
        Err(err) => Err(err),
    }
}

/// Clear one (locale, placement, window) triple: rank the pending bids,
/// debit and activate the winners, and disposition the losers. Idempotent —
/// it only acts on bids still pending for exactly this window, with every
/// write a conditional per-bid transition, so a crashed or duplicated run
/// is safe to repeat.
///
/// Per-bid ledger failures are converted into dispositions, never
/// propagated: one user's stale balance must not block the rest of the
/// window. Only an infrastructure failure aborts the pass.
pub async fn clear_window(
    pool: &PgPool,
    locale: Locale,
    placement: Placement,
    window_start: DateTime<Utc>,
) -> Result<ClearingSummary> {
    let mut conn = pool.acquire().await?;

    let settings = settings::resolve(&mut conn, locale, placement).await?;
    if !settings.enabled {
        info!(%locale, %placement, %window_start, "clearing skipped, auction disabled");
        return Ok(ClearingSummary::disabled(locale, placement, window_start));
    }

    // Reap boosts whose run has ended; cheap to fold into the pass that is
    // already touching this (locale, placement).
    let expired = Bids::new(&mut conn).expire_stale(locale, placement, Utc::now()).await?;

    let candidates = Bids::new(&mut conn).pending_for_window(locale, placement, window_start).await?;
    let ranked = rank_bids(candidates);

    let max_winners = settings.max_winners.max(0) as usize;
    let mut winners = ranked;
    let losers = winners.split_off(max_winners.min(winners.len()));

    let boost_starts_at = window_start + settings.window_length();
    let boost_ends_at = boost_starts_at + settings.boost_duration();
    let next_window_start = window_start + settings.window_length();

    let mut summary = ClearingSummary {
        locale,
        placement,
        window_start,
        activated: vec![],
        refunded: vec![],
        rolled_over: vec![],
        expired,
        settings_disabled: false,
    };

    let mut demoted: Vec<BoostBid> = vec![];
    for bid in winners {
        match settle_winner(&mut conn, &bid, boost_starts_at, boost_ends_at).await? {
            WinnerOutcome::Activated => summary.activated.push(bid.id),
            WinnerOutcome::Demoted => demoted.push(bid),
            WinnerOutcome::AlreadySettled => {}
        }
    }

    for bid in losers.into_iter().chain(demoted) {
        if bid.auto_rollover {
            match Bids::new(&mut conn).rollover(bid.id, next_window_start).await {
                Ok(true) => summary.rolled_over.push(bid.id),
                Ok(false) => {}
                // The user already holds a pending bid in the target window,
                // so the partial unique index rejects the retarget. Release
                // this bid instead of stranding it pending in a past window.
                Err(err) if err.is_unique_violation() => {
                    info!(bid_id = %bid.id, user_id = %bid.user_id, "rollover target window occupied, refunding");
                    if Bids::new(&mut conn).refund(bid.id).await? {
                        summary.refunded.push(bid.id);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        } else if Bids::new(&mut conn).refund(bid.id).await? {
            summary.refunded.push(bid.id);
        }
    }

    info!(
        %locale,
        %placement,
        %window_start,
        activated = summary.activated.len(),
        refunded = summary.refunded.len(),
        rolled_over = summary.rolled_over.len(),
        expired = summary.expired,
        "window cleared"
    );

    Ok(summary)
}
