//! Registration and login for merchants and admins.

use crate::{
    api::AppState,
    core::{
        admin::{AdminIdentity, authenticate_admin},
        auth::{issue_admin_token, issue_merchant_token},
        merchant::{MerchantProfile, NewMerchant, authenticate_merchant, register_merchant},
        subscription::{UsageStats, usage_stats},
    },
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub business_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub merchant: MerchantProfile,
    pub subscription: UsageStats,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub merchant: MerchantProfile,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub token: String,
    pub admin: AdminIdentity,
}

/// Turns axum's JSON rejection into a validation error with the usual body shape.
pub(crate) fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| Error::validation(rejection.body_text()))
}

pub async fn register(
    State(state): State<AppState>,
    body: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let request = json_body(body)?;
    let now = Utc::now();

    let (merchant, subscription) = register_merchant(
        &state.db,
        NewMerchant {
            email: request.email,
            password: request.password,
            business_name: request.business_name,
            phone: request.phone,
        },
        state.settings.server.chat.trial_days,
        now,
    )
    .await?;

    let token =
        issue_merchant_token(&state.settings.jwt_secret, &merchant.id, &merchant.email, now)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            token,
            subscription: usage_stats(&subscription, now),
            merchant: merchant.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let request = json_body(body)?;
    let merchant = authenticate_merchant(&state.db, &request.email, &request.password).await?;
    let token = issue_merchant_token(
        &state.settings.jwt_secret,
        &merchant.id,
        &merchant.email,
        Utc::now(),
    )?;

    Ok(Json(LoginResponse {
        token,
        merchant: merchant.into(),
    }))
}

pub async fn admin_login(
    State(state): State<AppState>,
    body: std::result::Result<Json<AdminLoginRequest>, JsonRejection>,
) -> Result<Json<AdminLoginResponse>> {
    let request = json_body(body)?;
    let admin =
        authenticate_admin(&state.db, &state.settings, &request.username, &request.password).await?;
    let token = issue_admin_token(
        &state.settings.admin_jwt_secret,
        &admin.id,
        &admin.username,
        Utc::now(),
    )?;

    Ok(Json(AdminLoginResponse { token, admin }))
}
