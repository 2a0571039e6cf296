//! Bearer-token extractors for merchant and admin routes.

use crate::{
    api::AppState,
    core::auth::{AdminClaims, MerchantClaims, verify_admin_token, verify_merchant_token},
    errors::{Error, Result},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::unauthorized("missing bearer token"))
}

/// A request authenticated with a merchant token.
#[derive(Debug, Clone)]
pub struct MerchantAuth(pub MerchantClaims);

#[async_trait]
impl FromRequestParts<AppState> for MerchantAuth {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers)?;
        verify_merchant_token(&state.settings.jwt_secret, token).map(Self)
    }
}

/// A request authenticated with an admin token.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub AdminClaims);

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers)?;
        verify_admin_token(&state.settings.admin_jwt_secret, token, Utc::now()).map(Self)
    }
}
