//! Password hashing and token issuance.
//!
//! Merchants and admins use separate secrets. Merchant tokens live 7 days.
//! Admin tokens live 24 hours, carry a fixed issuer/audience pair, and are
//! additionally rejected once their `loginTime` is older than 24 hours.

use crate::errors::{Error, Result};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

pub const MERCHANT_TOKEN_DAYS: i64 = 7;
pub const ADMIN_TOKEN_HOURS: i64 = 24;
pub const ADMIN_ISSUER: &str = "merchant-bot";
pub const ADMIN_AUDIENCE: &str = "merchant-bot-admin";

/// Claims carried by a merchant token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantClaims {
    pub merchant_id: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by an admin token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminClaims {
    pub admin_id: String,
    pub username: String,
    /// Milliseconds since the epoch at which the admin logged in
    pub login_time: i64,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Hashes a password into an argon2 PHC string with a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash {
            message: e.to_string(),
        })
}

/// Checks a password against a stored PHC string. A malformed hash never verifies.
#[must_use]
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// [`hash_password`] on the blocking pool, off the async workers.
pub async fn hash_password_async(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::PasswordHash {
            message: e.to_string(),
        })?
}

/// [`verify_password`] on the blocking pool, off the async workers.
pub async fn verify_password_async(password: &str, password_hash: &str) -> Result<bool> {
    let (password, password_hash) = (password.to_string(), password_hash.to_string());
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| Error::PasswordHash {
            message: e.to_string(),
        })
}

fn map_token_error(err: jsonwebtoken::errors::Error) -> Error {
    match err.kind() {
        ErrorKind::ExpiredSignature => Error::unauthorized("token expired"),
        ErrorKind::InvalidIssuer => Error::unauthorized("invalid token issuer"),
        ErrorKind::InvalidAudience => Error::unauthorized("invalid token audience"),
        ErrorKind::InvalidSignature => Error::unauthorized("invalid token signature"),
        _ => Error::Token(err),
    }
}

/// Issues a merchant token valid for [`MERCHANT_TOKEN_DAYS`].
pub fn issue_merchant_token(
    secret: &str,
    merchant_id: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let claims = MerchantClaims {
        merchant_id: merchant_id.to_string(),
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(MERCHANT_TOKEN_DAYS)).timestamp(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verifies signature and expiry of a merchant token.
pub fn verify_merchant_token(secret: &str, token: &str) -> Result<MerchantClaims> {
    let validation = Validation::default();
    decode::<MerchantClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(map_token_error)
}

/// Issues an admin token valid for [`ADMIN_TOKEN_HOURS`].
pub fn issue_admin_token(
    secret: &str,
    admin_id: &str,
    username: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let claims = AdminClaims {
        admin_id: admin_id.to_string(),
        username: username.to_string(),
        login_time: now.timestamp_millis(),
        is_admin: true,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ADMIN_TOKEN_HOURS)).timestamp(),
        iss: ADMIN_ISSUER.to_string(),
        aud: ADMIN_AUDIENCE.to_string(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verifies an admin token: signature, expiry, issuer, audience, the
/// `isAdmin` flag, and a `loginTime` no older than [`ADMIN_TOKEN_HOURS`].
pub fn verify_admin_token(secret: &str, token: &str, now: DateTime<Utc>) -> Result<AdminClaims> {
    let mut validation = Validation::default();
    validation.set_issuer(&[ADMIN_ISSUER]);
    validation.set_audience(&[ADMIN_AUDIENCE]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);

    let claims = decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(map_token_error)?;

    if !claims.is_admin {
        return Err(Error::Forbidden {
            message: "admin privileges required".to_string(),
        });
    }

    let session_age_ms = now.timestamp_millis() - claims.login_time;
    if session_age_ms > Duration::hours(ADMIN_TOKEN_HOURS).num_milliseconds() {
        return Err(Error::unauthorized("admin session expired"));
    }

    Ok(claims)
}
