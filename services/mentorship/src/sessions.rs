use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use uuid::Uuid;

use mentorlink_common::{AppError, Clock, SessionStatus, SessionType};
use mentorlink_database::MentorshipSession;

use crate::config::BookingConfig;
use crate::models::{
    ActiveSessionResponse, PartyInfo, SessionParty, SessionResponse, SessionStatusResponse,
    SessionSummary,
};
use crate::AppState;

pub struct SessionService {
    db_pool: PgPool,
    clock: Arc<dyn Clock>,
    booking: BookingConfig,
}

impl SessionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            clock: state.clock.clone(),
            booking: state.config.booking.clone(),
        }
    }

    /// All sessions the caller participates in, newest first, serialized
    /// through the party view resolved once per row.
    pub async fn list_sessions(&self, caller: Uuid) -> Result<Vec<SessionSummary>, AppError> {
        let rows = sqlx::query_as::<_, SessionWithNames>(
            r#"
            SELECT s.session_id, s.mentor_id, s.mentee_id, s.session_type,
                   s.session_date, s.session_time, s.duration_minutes, s.price,
                   s.topic, s.description, s.status, s.meeting_link, s.created_at,
                   m.name AS mentor_name, e.name AS mentee_name
            FROM mentorship_sessions s
            JOIN users m ON m.user_id = s.mentor_id
            JOIN users e ON e.user_id = s.mentee_id
            WHERE s.mentor_id = $1 OR s.mentee_id = $1
            ORDER BY s.scheduled_at DESC
            "#,
        )
        .bind(caller)
        .fetch_all(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let party = SessionParty::resolve(row.mentor_id, caller);
                let counterpart = match party {
                    SessionParty::Mentor => row.mentee_name,
                    SessionParty::Mentee => row.mentor_name,
                };
                SessionSummary {
                    id: row.session_id,
                    mentor_id: row.mentor_id,
                    mentee_id: row.mentee_id,
                    party,
                    avatar: crate::models::initials(&counterpart),
                    counterpart,
                    topic: row.topic,
                    description: row.description,
                    date: row.session_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    time: row.session_time,
                    duration_minutes: row.duration_minutes,
                    session_type: row.session_type,
                    price: row.price,
                    status: row.status,
                    meeting_link: row.meeting_link,
                    created_at: row.created_at,
                }
            })
            .collect())
    }

    /// Mentor-only state transition. Runs inside one transaction with the
    /// session row locked so timestamps and meeting links are set exactly once.
    pub async fn update_status(
        &self,
        session_id: Uuid,
        caller: Uuid,
        status_value: &str,
    ) -> Result<SessionResponse, AppError> {
        let next = SessionStatus::parse(status_value).ok_or_else(|| {
            AppError::Validation(format!("Unknown session status: {}", status_value))
        })?;

        let mut tx = self.db_pool.begin().await.map_err(AppError::Database)?;

        let mut session = sqlx::query_as::<_, MentorshipSession>(
            "SELECT * FROM mentorship_sessions WHERE session_id = $1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        if session.mentor_id != caller {
            return Err(AppError::Authorization(
                "Only the mentor can update session status".to_string(),
            ));
        }

        let current = SessionStatus::parse(&session.status).ok_or_else(|| {
            AppError::Internal(format!("Corrupt session status: {}", session.status))
        })?;

        if !current.can_transition_to(next) {
            return Err(AppError::Validation(format!(
                "Session cannot move from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }

        let host = self.booking.meeting_link_host.clone();
        let prefix = self.booking.meeting_room_prefix.clone();
        apply_transition(&mut session, next, self.clock.now(), |id| {
            meeting_link(&host, &prefix, id, &random_suffix())
        });

        sqlx::query(
            r#"
            UPDATE mentorship_sessions
            SET status = $1, meeting_link = $2, started_at = $3, ended_at = $4
            WHERE session_id = $5
            "#,
        )
        .bind(&session.status)
        .bind(&session.meeting_link)
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(session.session_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            session_id = %session.session_id,
            status = %session.status,
            "session status updated"
        );

        let mentor = fetch_party(&self.db_pool, session.mentor_id).await?;
        let mentee = fetch_party(&self.db_pool, session.mentee_id).await?;

        to_session_response(session, mentor, mentee)
    }

    /// Active chat session backing a conversation, for the chat timer.
    /// Completed sessions are included so the mentee can still rate.
    pub async fn active_for_conversation(
        &self,
        conversation_id: Uuid,
        caller: Uuid,
    ) -> Result<ActiveSessionResponse, AppError> {
        let session = sqlx::query_as::<_, MentorshipSession>(
            r#"
            SELECT * FROM mentorship_sessions
            WHERE conversation_id = $1
              AND session_type = 'chat'
              AND status IN ('confirmed', 'completed')
              AND (mentor_id = $2 OR mentee_id = $2)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .bind(caller)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("No active session found".to_string()))?;

        let remaining_seconds = session.remaining_seconds(self.clock.now());
        let mentor = fetch_party(&self.db_pool, session.mentor_id).await?;
        let mentee = fetch_party(&self.db_pool, session.mentee_id).await?;

        Ok(ActiveSessionResponse {
            id: session.session_id,
            mentor_id: session.mentor_id,
            mentor: mentor.name,
            mentee_id: session.mentee_id,
            mentee: mentee.name,
            topic: session.topic,
            date: session
                .session_date
                .map(|d| d.format("%Y-%m-%d").to_string()),
            time: session.session_time,
            duration_minutes: session.duration_minutes,
            session_type: session.session_type,
            status: session.status,
            started_at: session.started_at,
            ended_at: session.ended_at,
            remaining_seconds,
        })
    }

    // Quick status check for polling. Minimal payload to keep polls cheap.
    pub async fn check_status(
        &self,
        session_id: Uuid,
        caller: Uuid,
    ) -> Result<SessionStatusResponse, AppError> {
        let row = sqlx::query_as::<_, StatusRow>(
            "SELECT session_id, mentor_id, mentee_id, status, ended_at
             FROM mentorship_sessions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        if row.mentor_id != caller && row.mentee_id != caller {
            return Err(AppError::Authorization(
                "Only session participants can check its status".to_string(),
            ));
        }

        Ok(SessionStatusResponse {
            id: row.session_id,
            status: row.status,
            ended_at: row.ended_at,
        })
    }
}

/// Status write plus its side effects. `started_at` and `meeting_link` are
/// set only on the first transition into confirmed; `ended_at` only when the
/// session completes.
pub(crate) fn apply_transition(
    session: &mut MentorshipSession,
    next: SessionStatus,
    now: DateTime<Utc>,
    make_link: impl FnOnce(Uuid) -> String,
) {
    if next == SessionStatus::Confirmed {
        if session.started_at.is_none() {
            session.started_at = Some(now);
        }
        if session.session_type == SessionType::Video.as_str() && session.meeting_link.is_none() {
            session.meeting_link = Some(make_link(session.session_id));
        }
    }

    if next == SessionStatus::Completed {
        session.ended_at = Some(now);
    }

    session.status = next.as_str().to_string();
}

pub(crate) fn meeting_link(host: &str, prefix: &str, session_id: Uuid, suffix: &str) -> String {
    format!("{}/{}_{}_{}", host, prefix, session_id, suffix)
}

pub(crate) fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

pub(crate) async fn fetch_party(pool: &PgPool, user_id: Uuid) -> Result<PartyInfo, AppError> {
    let row = sqlx::query_as::<_, PartyRow>("SELECT user_id, name, email FROM users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(PartyInfo {
        id: row.user_id,
        name: row.name,
        email: Some(row.email),
    })
}

pub(crate) fn to_session_response(
    session: MentorshipSession,
    mentor: PartyInfo,
    mentee: PartyInfo,
) -> Result<SessionResponse, AppError> {
    let session_type = SessionType::parse(&session.session_type).ok_or_else(|| {
        AppError::Internal(format!("Corrupt session type: {}", session.session_type))
    })?;
    let status = SessionStatus::parse(&session.status)
        .ok_or_else(|| AppError::Internal(format!("Corrupt session status: {}", session.status)))?;

    Ok(SessionResponse {
        id: session.session_id,
        mentor,
        mentee,
        session_type,
        date: session.session_date.map(|d| d.format("%Y-%m-%d").to_string()),
        time: session.session_time,
        scheduled_at: session.scheduled_at,
        duration: session.duration_minutes,
        price: session.price,
        topic: session.topic,
        description: session.description,
        status,
        meeting_link: session.meeting_link,
    })
}

// Database row structs
#[derive(sqlx::FromRow)]
struct SessionWithNames {
    session_id: Uuid,
    mentor_id: Uuid,
    mentee_id: Uuid,
    session_type: String,
    session_date: Option<chrono::NaiveDate>,
    session_time: Option<String>,
    duration_minutes: i32,
    price: rust_decimal::Decimal,
    topic: String,
    description: Option<String>,
    status: String,
    meeting_link: Option<String>,
    created_at: DateTime<Utc>,
    mentor_name: String,
    mentee_name: String,
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    session_id: Uuid,
    mentor_id: Uuid,
    mentee_id: Uuid,
    status: String,
    ended_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct PartyRow {
    user_id: Uuid,
    name: String,
    email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn video_session() -> MentorshipSession {
        MentorshipSession {
            session_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            mentee_id: Uuid::new_v4(),
            conversation_id: None,
            session_type: "video".to_string(),
            session_date: None,
            session_time: None,
            scheduled_at: Utc::now(),
            duration_minutes: 60,
            price: Decimal::ZERO,
            topic: "Mentorship Session".to_string(),
            description: None,
            status: "pending".to_string(),
            meeting_link: None,
            started_at: None,
            ended_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn confirming_sets_started_at_and_video_link_once() {
        let mut session = video_session();
        let first = Utc::now();

        apply_transition(&mut session, SessionStatus::Confirmed, first, |id| {
            meeting_link("https://meet.jit.si", "MentorLink", id, "abcd1234")
        });

        assert_eq!(session.status, "confirmed");
        assert_eq!(session.started_at, Some(first));
        let link = session.meeting_link.clone().unwrap();
        assert!(link.starts_with(&format!(
            "https://meet.jit.si/MentorLink_{}_",
            session.session_id
        )));

        // Re-confirmation must not reset the timer or regenerate the link.
        let later = first + chrono::Duration::minutes(5);
        apply_transition(&mut session, SessionStatus::Confirmed, later, |id| {
            meeting_link("https://meet.jit.si", "MentorLink", id, "zzzz9999")
        });

        assert_eq!(session.started_at, Some(first));
        assert_eq!(session.meeting_link, Some(link));
    }

    #[test]
    fn chat_sessions_never_get_meeting_links() {
        let mut session = video_session();
        session.session_type = "chat".to_string();

        apply_transition(&mut session, SessionStatus::Confirmed, Utc::now(), |_| {
            panic!("chat confirmation must not build a link")
        });

        assert!(session.meeting_link.is_none());
        assert!(session.started_at.is_some());
    }

    #[test]
    fn completing_sets_ended_at() {
        let mut session = video_session();
        session.status = "confirmed".to_string();
        let now = Utc::now();

        apply_transition(&mut session, SessionStatus::Completed, now, |_| {
            unreachable!()
        });

        assert_eq!(session.status, "completed");
        assert_eq!(session.ended_at, Some(now));
    }

    #[test]
    fn cancelling_touches_status_only() {
        let mut session = video_session();
        session.status = "confirmed".to_string();

        apply_transition(&mut session, SessionStatus::Cancelled, Utc::now(), |_| {
            unreachable!()
        });

        assert_eq!(session.status, "cancelled");
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn random_suffix_is_eight_alphanumerics() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
