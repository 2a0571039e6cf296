//! Public widget endpoints.

use crate::{
    api::{AppState, handlers::auth::json_body},
    core::{
        chat::{ChatReply, ChatRequest, handle_chat_message},
        merchant::get_merchant_by_chatbot_id,
    },
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// What the embeddable widget needs to render itself.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    pub chatbot_id: String,
    pub business_name: String,
    pub bot_name: String,
    pub welcome_message: String,
    pub primary_color: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    pub session_id: String,
    pub message: String,
    pub customer_name: Option<String>,
}

pub async fn widget_config(
    State(state): State<AppState>,
    Path(chatbot_id): Path<String>,
) -> Result<Json<WidgetConfig>> {
    let merchant = get_merchant_by_chatbot_id(&state.db, &chatbot_id).await?;
    Ok(Json(WidgetConfig {
        chatbot_id: merchant.chatbot_id,
        business_name: merchant.business_name,
        bot_name: merchant.bot_name,
        welcome_message: merchant.welcome_message,
        primary_color: merchant.primary_color,
    }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(chatbot_id): Path<String>,
    body: std::result::Result<Json<ChatMessageRequest>, JsonRejection>,
) -> Result<Json<ChatReply>> {
    let request = json_body(body)?;
    let reply = handle_chat_message(
        &state.db,
        state.llm.as_ref(),
        &state.settings.server.chat,
        &chatbot_id,
        ChatRequest {
            session_id: request.session_id,
            message: request.message,
            customer_name: request.customer_name,
        },
        Utc::now(),
    )
    .await?;
    Ok(Json(reply))
}
