//! HTTP API - axum router, shared state, and handlers.
//!
//! Handlers stay thin: decode the request, call into [`crate::core`], and
//! encode the result. Errors become JSON responses in [`error`].

pub mod error;
pub mod extract;
pub mod handlers;

use crate::{
    config::{Settings, database::ConnectionProfile},
    llm::LlmProvider,
};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Which database connection profile is in use, and which ones were considered.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub active: ConnectionProfile,
    pub candidates: Vec<ConnectionProfile>,
}

/// Shared, cheaply clonable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub settings: Arc<Settings>,
    pub llm: Arc<dyn LlmProvider>,
    pub connection: Arc<ConnectionInfo>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        settings: Settings,
        llm: Arc<dyn LlmProvider>,
        active: ConnectionProfile,
        candidates: Vec<ConnectionProfile>,
    ) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            llm,
            connection: Arc::new(ConnectionInfo { active, candidates }),
        }
    }
}

/// Any origin when none are configured, since the widget is embedded on merchant sites.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.server.server.cors_allowed_origins);

    let public = Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/chatbot/:chatbot_id", get(handlers::chat::widget_config))
        .route("/api/chat/:chatbot_id", post(handlers::chat::send_message))
        .route("/api/admin/login", post(handlers::auth::admin_login));

    let merchant = Router::new()
        .route(
            "/api/merchant/profile",
            get(handlers::merchant::get_profile).put(handlers::merchant::update_profile),
        )
        .route("/api/merchant/usage", get(handlers::merchant::usage))
        .route(
            "/api/merchant/conversations",
            get(handlers::merchant::conversations),
        )
        .route(
            "/api/merchant/conversations/:id/messages",
            get(handlers::merchant::messages),
        );

    let admin = Router::new()
        .route("/api/admin/dashboard", get(handlers::admin::dashboard))
        .route("/api/admin/merchants", get(handlers::admin::merchants))
        .route(
            "/api/admin/subscriptions/reset-due",
            post(handlers::admin::reset_due),
        )
        .route(
            "/api/admin/subscriptions/:id",
            get(handlers::admin::get_subscription)
                .put(handlers::admin::update_subscription_handler),
        )
        .route(
            "/api/admin/subscriptions/:id/reset",
            post(handlers::admin::reset_subscription),
        )
        .route("/api/admin/admins", post(handlers::admin::create_admin_handler))
        .route(
            "/api/admin/diagnostics/database",
            get(handlers::diagnostics::database),
        )
        .route(
            "/api/admin/diagnostics/database/probe",
            post(handlers::diagnostics::probe_database),
        )
        .route("/api/admin/diagnostics/llm", get(handlers::diagnostics::llm));

    Router::new()
        .merge(public)
        .merge(merchant)
        .merge(admin)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::admin::create_admin,
        errors::Result,
        test_utils::{FailingLlm, StaticLlm, test_state},
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use chrono::Utc;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, email: &str) -> Value {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": "bakery-password",
                "businessName": "Corner Bakery"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn admin_token(app: &Router, state: &AppState) -> Result<String> {
        create_admin(&state.db, "ops", "ops-password", Utc::now()).await?;
        let (status, body) = send(
            app,
            Method::POST,
            "/api/admin/login",
            None,
            Some(json!({"username": "ops", "password": "ops-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        Ok(body["token"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_health() -> Result<()> {
        let state = test_state(Arc::new(StaticLlm::new("hi"))).await?;
        let app = router(state);

        let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"]["ok"], true);
        Ok(())
    }

    #[tokio::test]
    async fn test_health_hides_database_error_text() -> Result<()> {
        let state = test_state(Arc::new(StaticLlm::new("hi"))).await?;
        state.db.clone().close().await?;
        let app = router(state);

        let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"]["ok"], false);
        assert!(body["database"].get("error").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_register_login_and_profile() -> Result<()> {
        let app = router(test_state(Arc::new(StaticLlm::new("hi"))).await?);

        let registered = register(&app, "owner@bakery.example").await;
        assert_eq!(registered["merchant"]["businessName"], "Corner Bakery");
        assert!(registered["merchant"].get("passwordHash").is_none());
        assert_eq!(registered["subscription"]["status"], "TRIAL");
        assert_eq!(registered["subscription"]["messagesLimit"], 1000);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "owner@bakery.example", "password": "bakery-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, profile) =
            send(&app, Method::GET, "/api/merchant/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["email"], "owner@bakery.example");

        let (status, updated) = send(
            &app,
            Method::PUT,
            "/api/merchant/profile",
            Some(&token),
            Some(json!({"botName": "Sara", "primaryColor": "#10B981"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["botName"], "Sara");

        let (status, usage) =
            send(&app, Method::GET, "/api/merchant/usage", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(usage["messagesRemaining"], 1000);
        Ok(())
    }

    #[tokio::test]
    async fn test_auth_failures_map_to_statuses() -> Result<()> {
        let app = router(test_state(Arc::new(StaticLlm::new("hi"))).await?);
        register(&app, "dup@example.com").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "dup@example.com",
                "password": "bakery-password",
                "businessName": "Again"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "conflict");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "dup@example.com", "password": "wrong-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, Method::GET, "/api/merchant/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "auth");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "short@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation");
        Ok(())
    }

    #[tokio::test]
    async fn test_widget_chat_flow() -> Result<()> {
        let app = router(test_state(Arc::new(StaticLlm::new("Fresh bread daily!"))).await?);
        let registered = register(&app, "chat@example.com").await;
        let chatbot_id = registered["merchant"]["chatbotId"].as_str().unwrap().to_string();
        let token = registered["token"].as_str().unwrap().to_string();

        let (status, widget) =
            send(&app, Method::GET, &format!("/api/chatbot/{chatbot_id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(widget["businessName"], "Corner Bakery");

        let (status, reply) = send(
            &app,
            Method::POST,
            &format!("/api/chat/{chatbot_id}"),
            None,
            Some(json!({"sessionId": "visitor-1", "message": "What do you sell?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["reply"], "Fresh bread daily!");
        assert_eq!(reply["fallback"], false);
        assert_eq!(reply["messagesRemaining"], 999);

        let (status, conversations) =
            send(&app, Method::GET, "/api/merchant/conversations", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(conversations[0]["messageCount"], 2);

        let conversation_id = reply["conversationId"].as_str().unwrap();
        let (status, messages) = send(
            &app,
            Method::GET,
            &format!("/api/merchant/conversations/{conversation_id}/messages"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(messages[1]["role"], "assistant");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/chat/bot_missing",
            None,
            Some(json!({"sessionId": "visitor-1", "message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/chat/{chatbot_id}"),
            None,
            Some(json!({"sessionId": "visitor-1", "message": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn test_chat_fallback_when_llm_fails() -> Result<()> {
        let app = router(test_state(Arc::new(FailingLlm)).await?);
        let registered = register(&app, "down@example.com").await;
        let chatbot_id = registered["merchant"]["chatbotId"].as_str().unwrap().to_string();

        let (status, reply) = send(
            &app,
            Method::POST,
            &format!("/api/chat/{chatbot_id}"),
            None,
            Some(json!({"sessionId": "visitor-1", "message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["fallback"], true);
        assert!(reply["reply"].as_str().unwrap().contains("Corner Bakery"));
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_manages_subscription_and_quota() -> Result<()> {
        let state = test_state(Arc::new(StaticLlm::new("ok"))).await?;
        let app = router(state.clone());
        let registered = register(&app, "quota@example.com").await;
        let chatbot_id = registered["merchant"]["chatbotId"].as_str().unwrap().to_string();
        let merchant_token = registered["token"].as_str().unwrap().to_string();
        let token = admin_token(&app, &state).await?;

        let (status, merchants) =
            send(&app, Method::GET, "/api/admin/merchants", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let subscription_id = merchants[0]["subscriptionId"].as_str().unwrap().to_string();

        let (status, detail) = send(
            &app,
            Method::PUT,
            &format!("/api/admin/subscriptions/{subscription_id}"),
            Some(&token),
            Some(json!({"status": "ACTIVE", "messagesLimit": 1, "messagesUsed": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["status"], "ACTIVE");

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/chat/{chatbot_id}"),
            None,
            Some(json!({"sessionId": "visitor-1", "message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["details"]["limit"], 1);

        let (status, reset) = send(
            &app,
            Method::POST,
            &format!("/api/admin/subscriptions/{subscription_id}/reset"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reset["success"], true);
        assert_eq!(reset["subscription"]["messagesUsed"], 0);

        let (status, sweep) = send(
            &app,
            Method::POST,
            "/api/admin/subscriptions/reset-due",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sweep["result"]["totalChecked"], 1);

        let (status, dashboard) =
            send(&app, Method::GET, "/api/admin/dashboard", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dashboard["totalMerchants"], 1);

        // A merchant token is signed with the other secret.
        let (status, _) = send(
            &app,
            Method::GET,
            "/api/admin/dashboard",
            Some(&merchant_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_accounts_and_diagnostics() -> Result<()> {
        let state = test_state(Arc::new(StaticLlm::new("ok"))).await?;
        let app = router(state.clone());
        let token = admin_token(&app, &state).await?;

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/admin/admins",
            Some(&token),
            Some(json!({"username": "support", "password": "support-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["source"], "database");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/admin/admins",
            Some(&token),
            Some(json!({"username": "support", "password": "support-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, db_diag) = send(
            &app,
            Method::GET,
            "/api/admin/diagnostics/database",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(db_diag["activeProfile"], "direct");
        assert_eq!(db_diag["ping"]["ok"], true);
        assert_eq!(db_diag["configuredKeys"]["JWT_SECRET"], true);
        assert_eq!(db_diag["configuredKeys"]["LLM_API_KEY"], false);

        let (status, probes) = send(
            &app,
            Method::POST,
            "/api/admin/diagnostics/database/probe",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(probes[0]["ok"], true);

        let (status, llm_diag) = send(
            &app,
            Method::GET,
            "/api/admin/diagnostics/llm",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(llm_diag["primaryModel"], "stub-model");
        assert_eq!(llm_diag["workingModels"].as_array().unwrap().len(), 2);
        Ok(())
    }
}
