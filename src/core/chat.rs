//! The customer-facing chat flow behind the embeddable widget.
//!
//! A message is charged against the merchant's quota before the LLM is
//! called; an LLM failure still produces a (fallback) reply, so the reserved
//! message is never wasted.

use crate::{
    config::server::ChatSection,
    core::{
        conversation::{self, ROLE_ASSISTANT, ROLE_USER},
        merchant::get_merchant_by_chatbot_id,
        monthly::check_and_perform_reset_at,
        subscription::{check_chat_access, get_subscription_for_merchant, reserve_message},
    },
    entities::merchant,
    errors::{Error, Result},
    llm::{ChatMessage, LlmProvider, fallback_greeting},
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{info, instrument, warn};

const MAX_SESSION_ID_LEN: usize = 128;

/// An incoming widget message.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    pub customer_name: Option<String>,
}

/// What the widget gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub session_id: String,
    pub conversation_id: String,
    /// True when the LLM failed and the canned greeting was used
    pub fallback: bool,
    pub messages_remaining: i32,
}

/// Builds the system prompt from the merchant's bot customization.
#[must_use]
pub fn build_system_prompt(merchant: &merchant::Model) -> String {
    let mut prompt = format!(
        "You are {bot}, the customer support assistant for {business}. \
         Answer customer questions politely and concisely. \
         Reply in the same language the customer writes in.",
        bot = merchant.bot_name,
        business = merchant.business_name,
    );
    if let Some(phone) = &merchant.phone {
        prompt.push_str(&format!(
            " If the customer needs a human, they can call {phone}."
        ));
    }
    if let Some(instructions) = &merchant.custom_instructions {
        prompt.push_str("\n\nAdditional instructions from the business:\n");
        prompt.push_str(instructions);
    }
    prompt
}

fn validate_request(request: &ChatRequest, max_chars: usize) -> Result<(String, String)> {
    let session_id = request.session_id.trim();
    if session_id.is_empty() || session_id.len() > MAX_SESSION_ID_LEN {
        return Err(Error::validation("sessionId is required"));
    }

    let message = request.message.trim();
    if message.is_empty() {
        return Err(Error::validation("Message cannot be empty"));
    }
    if message.chars().count() > max_chars {
        return Err(Error::validation(format!(
            "Message cannot exceed {max_chars} characters"
        )));
    }

    Ok((session_id.to_string(), message.to_string()))
}

/// Handles one customer message end to end.
///
/// # Errors
/// * [`Error::Validation`] - empty/oversized message or missing session id
/// * [`Error::MerchantNotFound`] - unknown `chatbot_id`
/// * [`Error::SubscriptionInactive`] / [`Error::SubscriptionExpired`] - chat is not allowed
/// * [`Error::MessageLimitReached`] - the quota is used up
#[instrument(skip(db, llm, chat, request), fields(session_id = %request.session_id))]
pub async fn handle_chat_message(
    db: &DatabaseConnection,
    llm: &dyn LlmProvider,
    chat: &ChatSection,
    chatbot_id: &str,
    request: ChatRequest,
    now: DateTime<Utc>,
) -> Result<ChatReply> {
    let (session_id, message) = validate_request(&request, chat.max_message_chars)?;

    let merchant = get_merchant_by_chatbot_id(db, chatbot_id).await?;
    let subscription = get_subscription_for_merchant(db, &merchant.id).await?;
    let subscription = check_and_perform_reset_at(db, subscription, now).await?;

    check_chat_access(&subscription, now)?;
    let subscription = reserve_message(db, &subscription.id, now).await?;

    let conversation = conversation::get_or_create_conversation(
        db,
        &merchant.id,
        &session_id,
        request.customer_name.as_deref(),
        now,
    )
    .await?;
    conversation::add_message(db, &conversation.id, ROLE_USER, &message, now).await?;

    // The window always includes the message just stored.
    let window = chat.history_limit.max(1);
    let history = conversation::recent_messages(db, &conversation.id, window).await?;
    let mut prompt = vec![ChatMessage::system(build_system_prompt(&merchant))];
    prompt.extend(
        history
            .into_iter()
            .map(|m| ChatMessage::new(m.role, m.content)),
    );

    let (reply, fallback) = match llm.complete(&prompt).await {
        Ok(reply) => (reply, false),
        Err(e) => {
            warn!(
                merchant_id = %merchant.id,
                error = %e,
                "LLM unavailable, sending fallback greeting"
            );
            (
                fallback_greeting(&message, &merchant.bot_name, &merchant.business_name),
                true,
            )
        }
    };

    conversation::add_message(db, &conversation.id, ROLE_ASSISTANT, &reply, Utc::now()).await?;

    info!(
        merchant_id = %merchant.id,
        conversation_id = %conversation.id,
        fallback,
        "Chat message handled"
    );

    Ok(ChatReply {
        reply,
        session_id,
        conversation_id: conversation.id,
        fallback,
        messages_remaining: (subscription.messages_limit - subscription.messages_used).max(0),
    })
}
