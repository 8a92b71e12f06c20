use crate::db::errors::DbError;
use crate::types::{Locale, Placement};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, Error>;

/// Application error taxonomy. Every variant except `Database` is an
/// expected, caller-visible outcome rather than a failure of the service.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: non-positive amounts, unknown enum values that made
    /// it past deserialization, etc. Caller-fixable, never retried.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The (locale, placement) pair has no configuration or is explicitly
    /// switched off. Bidding is not available there.
    #[error("auction disabled for {locale}/{placement}")]
    AuctionDisabled { locale: Locale, placement: Placement },

    /// Bid amount is below the configured minimum; the minimum is surfaced
    /// so the client can retry with a corrected value.
    #[error("bid below minimum of {min_bid_credits} credits")]
    BidTooLow { min_bid_credits: i64 },

    /// A pending bid already exists for this user and window. The caller
    /// should fetch and show the existing bid instead of retrying.
    #[error("a pending bid already exists for the window starting {window_start}")]
    BidConflict { window_start: DateTime<Utc> },

    /// The user's spendable balance does not cover the requested debit.
    /// During clearing this demotes the bid rather than failing the pass.
    #[error("insufficient credits: {requested} requested, {available} available")]
    InsufficientCredits { requested: i64, available: i64 },

    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(err.into())
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } | Error::BidTooLow { .. } => StatusCode::BAD_REQUEST,
            Error::AuctionDisabled { .. } => StatusCode::NOT_FOUND,
            Error::BidConflict { .. } | Error::InsufficientCredits { .. } => StatusCode::CONFLICT,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal errors are logged in full but not leaked to the client.
        let body = match &self {
            Error::Database(db_err) => {
                error!("database error: {db_err}");
                json!({ "error": "internal server error" })
            }
            Error::BidTooLow { min_bid_credits } => {
                json!({ "error": self.to_string(), "min_bid_credits": min_bid_credits })
            }
            Error::InsufficientCredits { requested, available } => {
                json!({ "error": self.to_string(), "requested": requested, "available": available })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
