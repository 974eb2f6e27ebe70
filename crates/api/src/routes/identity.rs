//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified user
//! id and role as `x-user-id` and `x-user-role`.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{CallerIdentity, Role, UserId};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub CallerIdentity);

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: UserId = header_value(&parts.headers, USER_ID_HEADER)?
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("invalid {USER_ID_HEADER} header")))?;
        let role: Role = header_value(&parts.headers, USER_ROLE_HEADER)?
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("invalid {USER_ROLE_HEADER} header")))?;

        Ok(Caller(CallerIdentity::new(user_id, role)))
    }
}
