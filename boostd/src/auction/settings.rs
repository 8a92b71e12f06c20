use crate::{
    db::{handlers::Settings, models::settings::AuctionSettings},
    errors::Result,
    types::{Locale, Placement},
};
use sqlx::PgConnection;

/// Resolve the operating parameters for one (locale, placement). An
/// unconfigured pair resolves to disabled defaults rather than an error:
/// fail-closed, an auction nobody configured cannot run.
pub async fn resolve(conn: &mut PgConnection, locale: Locale, placement: Placement) -> Result<AuctionSettings> {
    let stored = Settings::new(conn).get(locale, placement).await?;
    Ok(stored.unwrap_or_else(|| AuctionSettings::disabled(locale, placement)))
}
