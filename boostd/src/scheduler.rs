use crate::{
    auction::{clearing, window},
    config::Config,
    db::handlers::Settings,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Timer wrapper around window clearing. Holds no auction logic: each tick
/// it asks the settings table which (locale, placement) pairs are live,
/// computes the most recently closed window for each, and invokes the
/// clearing pass. Re-invoking for an already-cleared window is harmless
/// because clearing only touches bids still pending for that window.
#[derive(Clone)]
pub struct ClearingScheduler {
    pool: PgPool,
    config: Config,
}

impl ClearingScheduler {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self { pool, config }
    }

    /// Run the tick loop until the token is cancelled. Spawned on the
    /// leader replica only; a follower that becomes leader starts a fresh
    /// loop, and overlap across a handover is tolerated by clearing's
    /// idempotency.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.clearing_tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(tick = ?self.config.clearing_tick, "clearing scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        error!("clearing tick failed: {e}");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("clearing scheduler stopping");
                    return;
                }
            }
        }
    }

    /// One pass over every enabled (locale, placement). Per-pair failures
    /// are logged and skipped so one broken auction cannot starve the rest.
    pub async fn tick(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut conn = self.pool.acquire().await?;
        let pairs = Settings::new(&mut conn).list_enabled().await?;
        drop(conn);

        debug!(pairs = pairs.len(), "clearing tick");

        for settings in pairs {
            let window_start = window::last_closed_window(now, settings.window_minutes);
            if let Err(e) = clearing::clear_window(&self.pool, settings.locale, settings.placement, window_start).await {
                error!(
                    locale = %settings.locale,
                    placement = %settings.placement,
                    %window_start,
                    "clearing failed: {e}"
                );
            }
        }

        Ok(())
    }
}
