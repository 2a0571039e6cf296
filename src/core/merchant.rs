//! Merchant business logic - registration, login, and profile management.
//!
//! Registration creates the merchant and its trial subscription in one
//! database transaction so a merchant never exists without a subscription.

use crate::{
    core::{auth, subscription::create_trial_subscription},
    entities::{Merchant, merchant, subscription},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, SqlErr, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;
const DEFAULT_PRIMARY_COLOR: &str = "#4F46E5";
const DEFAULT_BOT_NAME: &str = "Assistant";

/// Input for [`register_merchant`].
#[derive(Debug, Clone)]
pub struct NewMerchant {
    pub email: String,
    pub password: String,
    pub business_name: String,
    pub phone: Option<String>,
}

/// Profile fields a merchant may change. `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub bot_name: Option<String>,
    pub welcome_message: Option<String>,
    pub primary_color: Option<String>,
    pub custom_instructions: Option<String>,
}

/// The merchant as shown to the merchant and to admins. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantProfile {
    pub id: String,
    pub email: String,
    pub business_name: String,
    pub phone: Option<String>,
    pub chatbot_id: String,
    pub bot_name: String,
    pub welcome_message: String,
    pub primary_color: String,
    pub custom_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<merchant::Model> for MerchantProfile {
    fn from(model: merchant::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            business_name: model.business_name,
            phone: model.phone,
            chatbot_id: model.chatbot_id,
            bot_name: model.bot_name,
            welcome_message: model.welcome_message,
            primary_color: model.primary_color,
            custom_instructions: model.custom_instructions,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Minimal shape check: one `@`, non-empty local part, a dot in the domain.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Generates the public widget identifier.
fn generate_chatbot_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("bot_{}", &raw[..16])
}

fn default_welcome_message(business_name: &str) -> String {
    format!("Welcome to {business_name}! How can I help you today?")
}

/// Registers a merchant and starts its trial.
///
/// # Errors
/// * [`Error::Validation`] - bad email, short password, or empty business name
/// * [`Error::EmailTaken`] - the email is already registered
pub async fn register_merchant(
    db: &DatabaseConnection,
    input: NewMerchant,
    trial_days: i64,
    now: DateTime<Utc>,
) -> Result<(merchant::Model, subscription::Model)> {
    let email = normalize_email(&input.email);
    if !is_valid_email(&email) {
        return Err(Error::validation("A valid email address is required"));
    }
    if input.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let business_name = input.business_name.trim().to_string();
    if business_name.is_empty() {
        return Err(Error::validation("Business name cannot be empty"));
    }

    let exists = Merchant::find()
        .filter(merchant::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
        .is_some();
    if exists {
        return Err(Error::EmailTaken { email });
    }

    let password_hash = auth::hash_password_async(&input.password).await?;

    let txn = db.begin().await?;

    let merchant = merchant::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        welcome_message: Set(default_welcome_message(&business_name)),
        business_name: Set(business_name),
        phone: Set(input.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())),
        chatbot_id: Set(generate_chatbot_id()),
        bot_name: Set(DEFAULT_BOT_NAME.to_string()),
        primary_color: Set(DEFAULT_PRIMARY_COLOR.to_string()),
        custom_instructions: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    // A concurrent registration can still win the race past the check above.
    let merchant = match merchant.insert(&txn).await {
        Ok(model) => model,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(Error::EmailTaken { email });
        }
        Err(e) => return Err(e.into()),
    };

    let subscription = create_trial_subscription(&txn, &merchant.id, now, trial_days).await?;

    txn.commit().await?;

    info!(merchant_id = %merchant.id, chatbot_id = %merchant.chatbot_id, "Merchant registered");
    Ok((merchant, subscription))
}

/// Checks merchant credentials. Unknown email and wrong password are the same error.
pub async fn authenticate_merchant(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
) -> Result<merchant::Model> {
    let merchant = Merchant::find()
        .filter(merchant::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await?
        .ok_or(Error::InvalidCredentials)?;

    if !auth::verify_password_async(password, &merchant.password_hash).await? {
        return Err(Error::InvalidCredentials);
    }

    Ok(merchant)
}

pub async fn get_merchant_by_id(
    db: &DatabaseConnection,
    merchant_id: &str,
) -> Result<merchant::Model> {
    Merchant::find_by_id(merchant_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::MerchantNotFound {
            id: merchant_id.to_string(),
        })
}

/// Resolves the merchant behind a widget's `chatbot_id`.
pub async fn get_merchant_by_chatbot_id(
    db: &DatabaseConnection,
    chatbot_id: &str,
) -> Result<merchant::Model> {
    Merchant::find()
        .filter(merchant::Column::ChatbotId.eq(chatbot_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::MerchantNotFound {
            id: chatbot_id.to_string(),
        })
}

/// Applies a profile edit after validating every supplied field.
pub async fn update_merchant_profile(
    db: &DatabaseConnection,
    merchant_id: &str,
    changes: ProfileUpdate,
    now: DateTime<Utc>,
) -> Result<merchant::Model> {
    let existing = get_merchant_by_id(db, merchant_id).await?;
    let mut active: merchant::ActiveModel = existing.into();

    if let Some(name) = changes.business_name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::validation("Business name cannot be empty"));
        }
        active.business_name = Set(name);
    }
    if let Some(phone) = changes.phone {
        let phone = phone.trim().to_string();
        active.phone = Set((!phone.is_empty()).then_some(phone));
    }
    if let Some(bot_name) = changes.bot_name {
        let bot_name = bot_name.trim().to_string();
        if bot_name.is_empty() {
            return Err(Error::validation("Bot name cannot be empty"));
        }
        active.bot_name = Set(bot_name);
    }
    if let Some(welcome) = changes.welcome_message {
        let welcome = welcome.trim().to_string();
        if welcome.is_empty() {
            return Err(Error::validation("Welcome message cannot be empty"));
        }
        active.welcome_message = Set(welcome);
    }
    if let Some(color) = changes.primary_color {
        if !is_valid_color(&color) {
            return Err(Error::validation("Primary color must look like #RRGGBB"));
        }
        active.primary_color = Set(color);
    }
    if let Some(instructions) = changes.custom_instructions {
        let instructions = instructions.trim().to_string();
        active.custom_instructions = Set((!instructions.is_empty()).then_some(instructions));
    }

    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}
