//! Bearer-token authentication extractor.

use crate::{
    api::AppState,
    core::user::{self, SessionUser},
    errors::Error,
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};

/// The authenticated caller. Resolving it refreshes the session's idle timer.
/// Usage in handlers: `async fn handler(CurrentUser(caller): CurrentUser) -> ...`
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

/// Extracts the token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| Error::unauthorized("Missing bearer token"))?;
        let caller = user::authenticate(&state.db, token, &state.config.sessions).await?;
        Ok(Self(caller))
    }
}
