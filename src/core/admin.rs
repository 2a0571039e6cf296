//! Admin accounts - environment-configured super admin plus database-backed admins.

use crate::{
    config::Settings,
    core::auth,
    entities::{Admin, admin},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::*};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Id reported for the admin configured through environment variables.
pub const ENV_ADMIN_ID: &str = "env-admin";

/// Who logged in, independent of where the credentials came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    pub id: String,
    pub username: String,
    /// `"env"` or `"database"`
    pub source: &'static str,
}

/// Checks the environment admin first, then the `admins` table.
///
/// A configured `ADMIN_PASSWORD_HASH` takes precedence over a plain
/// `ADMIN_PASSWORD`.
pub async fn authenticate_admin(
    db: &DatabaseConnection,
    settings: &Settings,
    username: &str,
    password: &str,
) -> Result<AdminIdentity> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(Error::InvalidCredentials);
    }

    if settings.admin.username.as_deref() == Some(username) {
        let matches = match (&settings.admin.password_hash, &settings.admin.password) {
            (Some(hash), _) => auth::verify_password_async(password, hash).await?,
            (None, Some(plain)) => plain == password,
            (None, None) => {
                warn!("ADMIN_USERNAME is set without ADMIN_PASSWORD or ADMIN_PASSWORD_HASH");
                false
            }
        };
        if matches {
            return Ok(AdminIdentity {
                id: ENV_ADMIN_ID.to_string(),
                username: username.to_string(),
                source: "env",
            });
        }
    }

    let stored = Admin::find()
        .filter(admin::Column::Username.eq(username))
        .one(db)
        .await?
        .ok_or(Error::InvalidCredentials)?;

    if !auth::verify_password_async(password, &stored.password_hash).await? {
        return Err(Error::InvalidCredentials);
    }

    Ok(AdminIdentity {
        id: stored.id,
        username: stored.username,
        source: "database",
    })
}

/// Creates a database-backed admin.
///
/// # Errors
/// * [`Error::Validation`] - empty username or short password
/// * [`Error::AdminExists`] - the username is taken
pub async fn create_admin(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<admin::Model> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::validation("Username cannot be empty"));
    }
    if password.chars().count() < crate::core::merchant::MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {} characters",
            crate::core::merchant::MIN_PASSWORD_LEN
        )));
    }

    let exists = Admin::find()
        .filter(admin::Column::Username.eq(username))
        .one(db)
        .await?
        .is_some();
    if exists {
        return Err(Error::AdminExists {
            username: username.to_string(),
        });
    }

    let admin = admin::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        username: Set(username.to_string()),
        password_hash: Set(auth::hash_password_async(password).await?),
        created_at: Set(now),
    };

    let created = admin.insert(db).await?;
    info!(admin_id = %created.id, username = %created.username, "Admin created");
    Ok(created)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_env_admin_plain_password() -> Result<()> {
        let db = setup_test_db().await?;
        let mut settings = test_settings();
        settings.admin.username = Some("root".to_string());
        settings.admin.password = Some("s3cret-pass".to_string());

        let identity = authenticate_admin(&db, &settings, "root", "s3cret-pass").await?;
        assert_eq!(identity.id, ENV_ADMIN_ID);
        assert_eq!(identity.source, "env");

        let wrong = authenticate_admin(&db, &settings, "root", "nope").await;
        assert!(matches!(wrong, Err(Error::InvalidCredentials)));
        Ok(())
    }

    #[tokio::test]
    async fn test_env_admin_hash_wins_over_plain() -> Result<()> {
        let db = setup_test_db().await?;
        let mut settings = test_settings();
        settings.admin.username = Some("root".to_string());
        settings.admin.password = Some("plain-password".to_string());
        settings.admin.password_hash = Some(auth::hash_password("hashed-password")?);

        assert!(
            authenticate_admin(&db, &settings, "root", "hashed-password")
                .await
                .is_ok()
        );
        assert!(
            authenticate_admin(&db, &settings, "root", "plain-password")
                .await
                .is_err()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_database_admin() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = test_settings();
        let created = create_admin(&db, " ops ", "ops-password", Utc::now()).await?;
        assert_eq!(created.username, "ops");

        let identity = authenticate_admin(&db, &settings, "ops", "ops-password").await?;
        assert_eq!(identity.id, created.id);
        assert_eq!(identity.source, "database");

        let unknown = authenticate_admin(&db, &settings, "ghost", "ops-password").await;
        assert!(matches!(unknown, Err(Error::InvalidCredentials)));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_admin_rejects_duplicates_and_short_passwords() -> Result<()> {
        let db = setup_test_db().await?;
        create_admin(&db, "ops", "ops-password", Utc::now()).await?;

        let dup = create_admin(&db, "ops", "another-password", Utc::now()).await;
        assert!(matches!(dup, Err(Error::AdminExists { .. })));

        let short = create_admin(&db, "ops2", "short", Utc::now()).await;
        assert!(matches!(short, Err(Error::Validation { .. })));
        Ok(())
    }
}
