//! Conversation and message storage for the chat widget.

use crate::{
    entities::{Conversation, Message, conversation, message},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, SqlErr, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Conversation row plus how many messages it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub session_id: String,
    pub customer_name: Option<String>,
    pub message_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returns the merchant's conversation for this widget session, creating it
/// on first contact. A later non-empty `customer_name` is recorded.
pub async fn get_or_create_conversation(
    db: &DatabaseConnection,
    merchant_id: &str,
    session_id: &str,
    customer_name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<conversation::Model> {
    let customer_name = customer_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string);

    if let Some(found) = find_session(db, merchant_id, session_id).await? {
        return record_customer_name(db, found, customer_name).await;
    }

    let conversation = conversation::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        merchant_id: Set(merchant_id.to_string()),
        session_id: Set(session_id.to_string()),
        customer_name: Set(customer_name.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    // Overlapping first messages of one session race to this insert; the
    // unique (merchant_id, session_id) index lets only one of them win.
    match conversation.insert(db).await {
        Ok(model) => Ok(model),
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            let found = find_session(db, merchant_id, session_id)
                .await?
                .ok_or(Error::Database(e))?;
            record_customer_name(db, found, customer_name).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn find_session(
    db: &DatabaseConnection,
    merchant_id: &str,
    session_id: &str,
) -> Result<Option<conversation::Model>> {
    Ok(Conversation::find()
        .filter(conversation::Column::MerchantId.eq(merchant_id))
        .filter(conversation::Column::SessionId.eq(session_id))
        .one(db)
        .await?)
}

async fn record_customer_name(
    db: &DatabaseConnection,
    found: conversation::Model,
    customer_name: Option<String>,
) -> Result<conversation::Model> {
    if customer_name.is_some() && found.customer_name.is_none() {
        let mut active: conversation::ActiveModel = found.into();
        active.customer_name = Set(customer_name);
        return Ok(active.update(db).await?);
    }
    Ok(found)
}

/// Appends a message and bumps the conversation's `updated_at`.
pub async fn add_message(
    db: &DatabaseConnection,
    conversation_id: &str,
    role: &str,
    content: &str,
    now: DateTime<Utc>,
) -> Result<message::Model> {
    let message = message::ActiveModel {
        conversation_id: Set(conversation_id.to_string()),
        role: Set(role.to_string()),
        content: Set(content.to_string()),
        created_at: Set(now),
        ..Default::default()
    };
    let message = message.insert(db).await?;

    Conversation::update_many()
        .col_expr(conversation::Column::UpdatedAt, Expr::value(now))
        .filter(conversation::Column::Id.eq(conversation_id))
        .exec(db)
        .await?;

    Ok(message)
}

/// The last `limit` messages of a conversation, oldest first.
pub async fn recent_messages(
    db: &DatabaseConnection,
    conversation_id: &str,
    limit: u64,
) -> Result<Vec<message::Model>> {
    let mut messages = Message::find()
        .filter(message::Column::ConversationId.eq(conversation_id))
        .order_by_desc(message::Column::Id)
        .limit(limit)
        .all(db)
        .await?;
    messages.reverse();
    Ok(messages)
}

/// All conversations of a merchant, most recently active first.
pub async fn list_conversations(
    db: &DatabaseConnection,
    merchant_id: &str,
) -> Result<Vec<ConversationSummary>> {
    let conversations = Conversation::find()
        .filter(conversation::Column::MerchantId.eq(merchant_id))
        .order_by_desc(conversation::Column::UpdatedAt)
        .all(db)
        .await?;

    let ids: Vec<String> = conversations.iter().map(|c| c.id.clone()).collect();
    let counts: HashMap<String, i64> = Message::find()
        .select_only()
        .column(message::Column::ConversationId)
        .column_as(Expr::col(message::Column::Id).count(), "count")
        .filter(message::Column::ConversationId.is_in(ids))
        .group_by(message::Column::ConversationId)
        .into_tuple::<(String, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    conversations
        .into_iter()
        .map(|c| {
            let message_count = u64::try_from(counts.get(&c.id).copied().unwrap_or(0))?;
            Ok(ConversationSummary {
                message_count,
                id: c.id,
                session_id: c.session_id,
                customer_name: c.customer_name,
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
        })
        .collect()
}

/// Full message history of one conversation, if it belongs to the merchant.
pub async fn conversation_messages(
    db: &DatabaseConnection,
    merchant_id: &str,
    conversation_id: &str,
) -> Result<Vec<message::Model>> {
    let owned = Conversation::find_by_id(conversation_id)
        .filter(conversation::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?
        .is_some();
    if !owned {
        return Err(Error::ConversationNotFound {
            id: conversation_id.to_string(),
        });
    }

    Ok(Message::find()
        .filter(message::Column::ConversationId.eq(conversation_id))
        .order_by_asc(message::Column::Id)
        .all(db)
        .await?)
}
