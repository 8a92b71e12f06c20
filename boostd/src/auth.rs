use crate::types::UserId;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

/// Header the fronting proxy sets after authenticating the caller.
/// Authentication itself is out of scope: this service consumes the
/// "authenticated, with this id" fact and nothing more.
pub const USER_ID_HEADER: &str = "x-boostd-user";

/// The authenticated caller, extracted from the trusted proxy header.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: UserId,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let unauthorized = || {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": format!("missing or invalid {USER_ID_HEADER} header") })),
            )
        };

        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(unauthorized)?;

        let id = Uuid::parse_str(header).map_err(|_| unauthorized())?;
        Ok(CurrentUser { id })
    }
}
