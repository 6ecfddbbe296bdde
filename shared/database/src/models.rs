use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MentorshipSession {
    pub session_id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub session_type: String,
    pub session_date: Option<NaiveDate>,
    pub session_time: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: Decimal,
    pub topic: String,
    pub description: Option<String>,
    pub status: String,
    pub meeting_link: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MentorshipSession {
    /// Seconds left on the session timer at `now`. Derived on read, never
    /// persisted. A session that has not started yet reports its full length.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        let total = i64::from(self.duration_minutes) * 60;
        match self.started_at {
            None => total,
            Some(started_at) => {
                let elapsed = (now - started_at).num_seconds();
                (total - elapsed).max(0)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn includes(&self, user_id: Uuid) -> bool {
        self.mentor_id == user_id || self.mentee_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(duration_minutes: i32, started_at: Option<DateTime<Utc>>) -> MentorshipSession {
        MentorshipSession {
            session_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            mentee_id: Uuid::new_v4(),
            conversation_id: None,
            session_type: "chat".to_string(),
            session_date: None,
            session_time: None,
            scheduled_at: Utc::now(),
            duration_minutes,
            price: Decimal::ZERO,
            topic: "Mentorship Session".to_string(),
            description: None,
            status: "confirmed".to_string(),
            meeting_link: None,
            started_at,
            ended_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unstarted_session_reports_full_duration() {
        let now = Utc::now();
        assert_eq!(session(60, None).remaining_seconds(now), 3600);
    }

    #[test]
    fn running_session_counts_down() {
        let now = Utc::now();
        let started = now - Duration::minutes(20);
        assert_eq!(session(60, Some(started)).remaining_seconds(now), 2400);
    }

    #[test]
    fn elapsed_session_clamps_to_zero() {
        let now = Utc::now();
        let started = now - Duration::hours(3);
        assert_eq!(session(60, Some(started)).remaining_seconds(now), 0);
    }

    #[test]
    fn conversation_includes_only_its_participants() {
        let conversation = Conversation {
            conversation_id: Uuid::new_v4(),
            mentor_id: Uuid::new_v4(),
            mentee_id: Uuid::new_v4(),
            last_message_at: Utc::now(),
            created_at: Utc::now(),
        };

        assert!(conversation.includes(conversation.mentor_id));
        assert!(conversation.includes(conversation.mentee_id));
        assert!(!conversation.includes(Uuid::new_v4()));
    }
}
