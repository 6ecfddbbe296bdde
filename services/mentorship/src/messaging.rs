use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use mentorlink_common::{AppError, Clock, RedisService, UserRole};
use mentorlink_database::Conversation;

use crate::models::{
    ConversationResponse, ConversationSummary, MessageResponse, SendMessageRequest,
};
use crate::sessions::fetch_party;
use crate::AppState;

pub struct MessageService {
    db_pool: PgPool,
    redis_service: RedisService,
    clock: Arc<dyn Clock>,
    rate_limit_per_minute: u32,
}

impl MessageService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            redis_service: state.redis_service.clone(),
            clock: state.clock.clone(),
            rate_limit_per_minute: state.config.payouts.message_rate_limit_per_minute,
        }
    }

    /// Inbox view: one row per conversation the caller is in, most recent
    /// first, with the counterpart's name, a preview of the latest message
    /// and the caller's unread count.
    pub async fn list_conversations(
        &self,
        caller: Uuid,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT c.conversation_id, c.mentor_id, c.mentee_id, c.last_message_at,
                   CASE WHEN c.mentor_id = $1 THEN e.name ELSE m.name END AS counterpart,
                   (SELECT content FROM messages
                    WHERE conversation_id = c.conversation_id
                    ORDER BY sent_at DESC LIMIT 1) AS last_message,
                   (SELECT COUNT(*) FROM messages
                    WHERE conversation_id = c.conversation_id
                      AND sender_id != $1
                      AND is_read = false) AS unread_count
            FROM conversations c
            JOIN users m ON m.user_id = c.mentor_id
            JOIN users e ON e.user_id = c.mentee_id
            WHERE c.mentor_id = $1 OR c.mentee_id = $1
            ORDER BY c.last_message_at DESC
            "#,
        )
        .bind(caller)
        .fetch_all(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| ConversationSummary {
                id: row.conversation_id,
                mentor_id: row.mentor_id,
                mentee_id: row.mentee_id,
                counterpart: row.counterpart,
                last_message: row.last_message,
                last_message_at: row.last_message_at,
                unread_count: row.unread_count,
            })
            .collect())
    }

    /// Opens a conversation: marks the counterpart's messages read and
    /// returns the full history, oldest first.
    pub async fn show(
        &self,
        conversation_id: Uuid,
        caller: Uuid,
    ) -> Result<Vec<MessageResponse>, AppError> {
        let mut tx = self.db_pool.begin().await.map_err(AppError::Database)?;

        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::Database)?
                .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        // Non-participants get the same 404 as a missing thread.
        if !conversation.includes(caller) {
            return Err(AppError::NotFound("Conversation not found".to_string()));
        }

        sqlx::query(
            "UPDATE messages SET is_read = true
             WHERE conversation_id = $1 AND sender_id != $2 AND is_read = false",
        )
        .bind(conversation_id)
        .bind(caller)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT ms.message_id, ms.conversation_id, ms.sender_id, u.name AS sender_name,
                   ms.content, ms.is_read, ms.sent_at
            FROM messages ms
            JOIN users u ON u.user_id = ms.sender_id
            WHERE ms.conversation_id = $1
            ORDER BY ms.sent_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(rows.into_iter().map(MessageRow::into_response).collect())
    }

    /// Sends a message. Rate limited per sender before any database work.
    pub async fn store(
        &self,
        conversation_id: Uuid,
        caller: Uuid,
        req: SendMessageRequest,
    ) -> Result<MessageResponse, AppError> {
        let content = req.content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }

        let rate_key = format!("rate_limit:messages:{}", caller);
        let allowed = self
            .redis_service
            .check_rate_limit(&rate_key, self.rate_limit_per_minute, 60)
            .await?;
        if !allowed {
            return Err(AppError::RateLimited(
                "Too many messages, slow down".to_string(),
            ));
        }

        let mut tx = self.db_pool.begin().await.map_err(AppError::Database)?;

        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::Database)?
                .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        if !conversation.includes(caller) {
            return Err(AppError::NotFound("Conversation not found".to_string()));
        }

        let now = self.clock.now();
        let message_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO messages (message_id, conversation_id, sender_id, content, is_read, sent_at)
            VALUES ($1, $2, $3, $4, false, $5)
            "#,
        )
        .bind(message_id)
        .bind(conversation_id)
        .bind(caller)
        .bind(&content)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        sqlx::query("UPDATE conversations SET last_message_at = $1 WHERE conversation_id = $2")
            .bind(now)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        let sender = fetch_party(&self.db_pool, caller).await?;

        Ok(MessageResponse {
            id: message_id,
            conversation_id,
            sender_id: caller,
            sender_name: sender.name,
            content,
            is_read: false,
            sent_at: now,
        })
    }

    /// Opens (or returns) the conversation between the caller and another
    /// user. The mentor seat goes to whichever side holds the mentor role.
    pub async fn create_conversation(
        &self,
        caller: Uuid,
        participant_id: Uuid,
    ) -> Result<ConversationResponse, AppError> {
        if caller == participant_id {
            return Err(AppError::Conflict(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }

        let participant_role: (String,) =
            sqlx::query_as("SELECT role FROM users WHERE user_id = $1")
                .bind(participant_id)
                .fetch_optional(&self.db_pool)
                .await
                .map_err(AppError::Database)?
                .ok_or_else(|| AppError::Validation("Unknown participant".to_string()))?;

        let existing: Option<(Uuid, Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT conversation_id, mentor_id, mentee_id FROM conversations
            WHERE (mentor_id = $1 AND mentee_id = $2)
               OR (mentor_id = $2 AND mentee_id = $1)
            "#,
        )
        .bind(caller)
        .bind(participant_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        if let Some((id, mentor_id, mentee_id)) = existing {
            let mentor = fetch_party(&self.db_pool, mentor_id).await?;
            let mentee = fetch_party(&self.db_pool, mentee_id).await?;
            return Ok(ConversationResponse {
                id,
                mentor,
                mentee,
                created: false,
            });
        }

        let participant_is_mentor = participant_role.0 == UserRole::Mentor.as_str();
        let (mentor_id, mentee_id) = normalize_pair(caller, participant_id, participant_is_mentor);

        let id = Uuid::new_v4();
        let now = self.clock.now();
        sqlx::query(
            r#"
            INSERT INTO conversations (conversation_id, mentor_id, mentee_id, last_message_at, created_at)
            VALUES ($1, $2, $3, $4, $4)
            "#,
        )
        .bind(id)
        .bind(mentor_id)
        .bind(mentee_id)
        .bind(now)
        .execute(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        let mentor = fetch_party(&self.db_pool, mentor_id).await?;
        let mentee = fetch_party(&self.db_pool, mentee_id).await?;

        Ok(ConversationResponse {
            id,
            mentor,
            mentee,
            created: true,
        })
    }
}

/// Orients a conversation pair into (mentor, mentee) seats.
pub(crate) fn normalize_pair(
    caller: Uuid,
    participant: Uuid,
    participant_is_mentor: bool,
) -> (Uuid, Uuid) {
    if participant_is_mentor {
        (participant, caller)
    } else {
        (caller, participant)
    }
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    conversation_id: Uuid,
    mentor_id: Uuid,
    mentee_id: Uuid,
    last_message_at: DateTime<Utc>,
    counterpart: String,
    last_message: Option<String>,
    unread_count: i64,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    message_id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    sender_name: String,
    content: String,
    is_read: bool,
    sent_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_response(self) -> MessageResponse {
        MessageResponse {
            id: self.message_id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            content: self.content,
            is_read: self.is_read,
            sent_at: self.sent_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentor_participant_takes_the_mentor_seat() {
        let caller = Uuid::new_v4();
        let participant = Uuid::new_v4();
        assert_eq!(
            normalize_pair(caller, participant, true),
            (participant, caller)
        );
    }

    #[test]
    fn otherwise_the_caller_is_the_mentor() {
        let caller = Uuid::new_v4();
        let participant = Uuid::new_v4();
        assert_eq!(
            normalize_pair(caller, participant, false),
            (caller, participant)
        );
    }
}
