use crate::{
    auction::{settings, window},
    db::{
        handlers::{Bids, Ledger},
        models::bids::{BidCreateDBRequest, BoostBid},
    },
    errors::{Error, Result},
    types::{Locale, Placement, UserId},
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SubmitBidRequest {
    pub user_id: UserId,
    pub placement: Placement,
    pub locale: Locale,
    pub bid_amount_credits: i64,
    pub auto_rollover: bool,
}

/// What submission hands back: the persisted bid, the boost timings the
/// user would get if they win, and their current balance so the caller can
/// render "you have enough to cover this" without a second round trip.
#[derive(Debug, Clone)]
pub struct SubmitBidOutcome {
    pub bid: BoostBid,
    pub boost_starts_at: DateTime<Utc>,
    pub boost_ends_at: DateTime<Utc>,
    pub available_credits: i64,
}

/// Validate and persist one pending bid for the window containing `now`.
/// No credits move here: debiting happens only for winners at clearing
/// time, so a user can bid speculatively without being charged on a loss.
pub async fn submit_bid(conn: &mut PgConnection, request: &SubmitBidRequest, now: DateTime<Utc>) -> Result<SubmitBidOutcome> {
    if request.bid_amount_credits <= 0 {
        return Err(Error::Validation {
            message: format!("bid amount must be a positive integer, got {}", request.bid_amount_credits),
        });
    }

    let settings = settings::resolve(conn, request.locale, request.placement).await?;
    if !settings.enabled {
        return Err(Error::AuctionDisabled {
            locale: request.locale,
            placement: request.placement,
        });
    }

    if request.bid_amount_credits < settings.min_bid_credits {
        return Err(Error::BidTooLow {
            min_bid_credits: settings.min_bid_credits,
        });
    }

    let window_start = window::window_start(now, settings.window_minutes);

    // Early typed conflict; the partial unique index backstops the race
    // between this check and the insert.
    if Bids::new(&mut *conn)
        .pending_exists(request.user_id, request.placement, request.locale, window_start)
        .await?
    {
        return Err(Error::BidConflict { window_start });
    }

    let bid = Bids::new(&mut *conn)
        .create(&BidCreateDBRequest {
            user_id: request.user_id,
            placement: request.placement,
            locale: request.locale,
            bid_amount_credits: request.bid_amount_credits,
            auction_window_start: window_start,
            auto_rollover: request.auto_rollover,
        })
        .await
        .map_err(|err| {
            if err.is_unique_violation() {
                Error::BidConflict { window_start }
            } else {
                Error::Database(err)
            }
        })?;

    // Informational only: submission succeeds regardless of balance.
    let available_credits = Ledger::new(&mut *conn).get_balance(request.user_id).await?;

    let boost_starts_at = window_start + settings.window_length();
    let boost_ends_at = boost_starts_at + settings.boost_duration();

    debug!(
        user_id = %request.user_id,
        locale = %request.locale,
        placement = %request.placement,
        amount = request.bid_amount_credits,
        %window_start,
        "bid submitted"
    );

    Ok(SubmitBidOutcome {
        bid,
        boost_starts_at,
        boost_ends_at,
        available_credits,
    })
}
