use crate::{
    db::{errors::Result, models::settings::AuctionSettings},
    types::{Locale, Placement},
};
use sqlx::PgConnection;

/// Read-mostly auction configuration, seeded from the service config at
/// startup and resolved per call.
pub struct Settings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Settings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn get(&mut self, locale: Locale, placement: Placement) -> Result<Option<AuctionSettings>> {
        let settings = sqlx::query_as::<_, AuctionSettings>(
            r#"
            SELECT locale, placement, enabled, min_bid_credits, window_minutes, duration_minutes, max_winners
            FROM auction_settings
            WHERE locale = $1 AND placement = $2
            "#,
        )
        .bind(locale)
        .bind(placement)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(settings)
    }

    /// Every (locale, placement) pair currently open for bidding — the set
    /// the clearing scheduler iterates each tick.
    pub async fn list_enabled(&mut self) -> Result<Vec<AuctionSettings>> {
        let settings = sqlx::query_as::<_, AuctionSettings>(
            r#"
            SELECT locale, placement, enabled, min_bid_credits, window_minutes, duration_minutes, max_winners
            FROM auction_settings
            WHERE enabled = TRUE
            ORDER BY locale, placement
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(settings)
    }

    pub async fn upsert(&mut self, settings: &AuctionSettings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auction_settings
                (locale, placement, enabled, min_bid_credits, window_minutes, duration_minutes, max_winners)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (locale, placement)
            DO UPDATE SET
                enabled = $3,
                min_bid_credits = $4,
                window_minutes = $5,
                duration_minutes = $6,
                max_winners = $7,
                updated_at = NOW()
            "#,
        )
        .bind(settings.locale)
        .bind(settings.placement)
        .bind(settings.enabled)
        .bind(settings.min_bid_credits)
        .bind(settings.window_minutes)
        .bind(settings.duration_minutes)
        .bind(settings.max_winners)
        .execute(&mut *self.db)
        .await?;

        Ok(())
    }
}
