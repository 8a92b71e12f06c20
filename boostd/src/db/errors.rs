use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Database-layer errors. Postgres constraint violations are classified so
/// callers can turn them into domain outcomes (a unique violation on the
/// pending-bid index becomes a bid conflict, a check violation on
/// `remaining` would mean a bug in the debit planner).
#[derive(Debug, Error)]
pub enum DbError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("check constraint violated: {constraint}")]
    CheckViolation { constraint: String },

    #[error("row not found")]
    NotFound,

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or_default().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => DbError::UniqueViolation { constraint },
                    Some("23514") => DbError::CheckViolation { constraint },
                    _ => DbError::Sqlx(err),
                }
            }
            _ => DbError::Sqlx(err),
        }
    }
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}
