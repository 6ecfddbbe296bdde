use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use mentorlink_common::{AppError, Clock, SessionStatus, SessionType};

use crate::config::BookingConfig;
use crate::models::{BookSessionRequest, BookSessionResponse, PartyInfo, SessionResponse};
use crate::sessions::fetch_party;
use crate::AppState;

const SCHEDULE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %I:%M %p", "%Y-%m-%d %H:%M:%S"];

pub struct BookingService {
    db_pool: PgPool,
    clock: Arc<dyn Clock>,
    booking: BookingConfig,
}

impl BookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            clock: state.clock.clone(),
            booking: state.config.booking.clone(),
        }
    }

    /// Books a session for the caller (the mentee). Creates the pending
    /// session and, when the pair has never talked, the conversation with a
    /// greeting message, all in one transaction.
    pub async fn book(
        &self,
        mentee_id: Uuid,
        req: BookSessionRequest,
    ) -> Result<BookSessionResponse, AppError> {
        if req.mentor_id == mentee_id {
            return Err(AppError::Validation(
                "You cannot book a session with yourself".to_string(),
            ));
        }

        let mentor = match fetch_party(&self.db_pool, req.mentor_id).await {
            Ok(mentor) => mentor,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Validation("Unknown mentor".to_string()))
            }
            Err(err) => return Err(err),
        };
        let mentee = fetch_party(&self.db_pool, mentee_id).await?;

        let price = req.price.unwrap_or(Decimal::ZERO);
        if price < Decimal::ZERO {
            return Err(AppError::Validation(
                "Price cannot be negative".to_string(),
            ));
        }

        let session_type = req.session_type.unwrap_or(SessionType::Video);
        let duration = req.duration.unwrap_or(self.booking.default_duration_minutes);
        let topic = req
            .topic
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.booking.default_topic.clone());

        let now = self.clock.now();
        let scheduled_at =
            resolve_scheduled_at(req.date.as_deref(), req.time.as_deref(), req.scheduled_at, now);
        let session_date = req
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or_else(|| scheduled_at.date_naive());
        let time_label = req
            .time
            .clone()
            .unwrap_or_else(|| scheduled_at.format("%-I:%M %p").to_string());

        let mut tx = self.db_pool.begin().await.map_err(AppError::Database)?;

        let existing: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT conversation_id FROM conversations
            WHERE (mentor_id = $1 AND mentee_id = $2)
               OR (mentor_id = $2 AND mentee_id = $1)
            "#,
        )
        .bind(req.mentor_id)
        .bind(mentee_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let conversation_id = match existing {
            Some((id,)) => id,
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO conversations (conversation_id, mentor_id, mentee_id, last_message_at, created_at)
                    VALUES ($1, $2, $3, $4, $4)
                    "#,
                )
                .bind(id)
                .bind(req.mentor_id)
                .bind(mentee_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;

                sqlx::query(
                    r#"
                    INSERT INTO messages (message_id, conversation_id, sender_id, content, is_read, sent_at)
                    VALUES ($1, $2, $3, $4, false, $5)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(id)
                .bind(mentee_id)
                .bind(booking_greeting(session_type, scheduled_at, &time_label))
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;

                id
            }
        };

        // Only chat sessions are anchored to the conversation; video sessions
        // get a meeting link on confirmation instead.
        let anchored_conversation = match session_type {
            SessionType::Chat => Some(conversation_id),
            SessionType::Video => None,
        };

        let session_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO mentorship_sessions
                (session_id, mentor_id, mentee_id, conversation_id, session_type,
                 session_date, session_time, scheduled_at, duration_minutes, price,
                 topic, description, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(session_id)
        .bind(req.mentor_id)
        .bind(mentee_id)
        .bind(anchored_conversation)
        .bind(session_type.as_str())
        .bind(session_date)
        .bind(&time_label)
        .bind(scheduled_at)
        .bind(duration)
        .bind(price)
        .bind(&topic)
        .bind(&req.description)
        .bind(SessionStatus::Pending.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            session_id = %session_id,
            mentor_id = %req.mentor_id,
            mentee_id = %mentee_id,
            "session booked"
        );

        Ok(BookSessionResponse {
            session: SessionResponse {
                id: session_id,
                mentor,
                mentee: PartyInfo {
                    id: mentee.id,
                    name: mentee.name,
                    email: mentee.email,
                },
                session_type,
                date: Some(session_date.format("%Y-%m-%d").to_string()),
                time: Some(time_label),
                scheduled_at,
                duration,
                price,
                topic,
                description: req.description,
                status: SessionStatus::Pending,
                meeting_link: None,
            },
            conversation_id,
        })
    }
}

/// Resolves the scheduling inputs in priority order: the date plus time
/// combination, then an explicit timestamp, then one day out as a fallback.
/// A date+time pair that fails every format degrades to the date at
/// midnight; a date without a time is not consulted at all.
pub(crate) fn resolve_scheduled_at(
    date: Option<&str>,
    time: Option<&str>,
    scheduled_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if let (Some(date), Some(time)) = (date, time) {
        let combined = format!("{} {}", date, time);
        for format in SCHEDULE_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(&combined, format) {
                return parsed.and_utc();
            }
        }
        if let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
                return midnight.and_utc();
            }
        }
    }

    scheduled_at.unwrap_or_else(|| now + Duration::days(1))
}

pub(crate) fn booking_greeting(
    session_type: SessionType,
    scheduled_at: DateTime<Utc>,
    time_label: &str,
) -> String {
    format!(
        "Hi! I've just booked a {} session for {} at {}. Looking forward to connecting!",
        session_type.as_str(),
        scheduled_at.format("%b %d, %Y"),
        time_label
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mentorlink_common::{Clock, FixedClock};

    fn now() -> DateTime<Utc> {
        FixedClock(Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()).now()
    }

    #[test]
    fn date_and_24h_time_win() {
        let at = resolve_scheduled_at(Some("2026-09-01"), Some("14:30"), None, now());
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 9, 1, 14, 30, 0).unwrap());
    }

    #[test]
    fn twelve_hour_time_is_accepted() {
        let at = resolve_scheduled_at(Some("2026-09-01"), Some("2:30 PM"), None, now());
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 9, 1, 14, 30, 0).unwrap());
    }

    #[test]
    fn unparseable_time_falls_back_to_midnight() {
        let at = resolve_scheduled_at(Some("2026-09-01"), Some("sometime"), None, now());
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn explicit_timestamp_used_without_date() {
        let explicit = Utc.with_ymd_and_hms(2026, 10, 5, 9, 0, 0).unwrap();
        let at = resolve_scheduled_at(None, None, Some(explicit), now());
        assert_eq!(at, explicit);
    }

    #[test]
    fn explicit_timestamp_beats_a_date_without_a_time() {
        let explicit = Utc.with_ymd_and_hms(2026, 10, 5, 9, 0, 0).unwrap();
        let at = resolve_scheduled_at(Some("2026-09-01"), None, Some(explicit), now());
        assert_eq!(at, explicit);
    }

    #[test]
    fn date_without_a_time_is_ignored() {
        let at = resolve_scheduled_at(Some("2026-09-01"), None, None, now());
        assert_eq!(at, now() + Duration::days(1));
    }

    #[test]
    fn nothing_given_schedules_tomorrow() {
        let at = resolve_scheduled_at(None, None, None, now());
        assert_eq!(at, now() + Duration::days(1));
    }

    #[test]
    fn greeting_names_the_session_type_and_date() {
        let at = Utc.with_ymd_and_hms(2026, 9, 1, 14, 30, 0).unwrap();
        let greeting = booking_greeting(SessionType::Chat, at, "2:30 PM");
        assert_eq!(
            greeting,
            "Hi! I've just booked a chat session for Sep 01, 2026 at 2:30 PM. Looking forward to connecting!"
        );
    }
}
