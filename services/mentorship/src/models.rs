use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use mentorlink_common::{SessionStatus, SessionType};

// ---- Requests ----

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookSessionRequest {
    pub mentor_id: Uuid,
    #[serde(rename = "type")]
    pub session_type: Option<SessionType>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(range(min = 15))]
    pub duration: Option<i32>,
    pub price: Option<Decimal>,
    #[validate(length(max = 255))]
    pub topic: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSessionStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationRequest {
    pub participant_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub session_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Option<Decimal>,
}

// ---- Responses ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyInfo {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

/// Which side of the session the caller is on, resolved once per request
/// instead of branching per serialized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionParty {
    Mentor,
    Mentee,
}

impl SessionParty {
    pub fn resolve(mentor_id: Uuid, viewer_id: Uuid) -> Self {
        if mentor_id == viewer_id {
            SessionParty::Mentor
        } else {
            SessionParty::Mentee
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub mentor: PartyInfo,
    pub mentee: PartyInfo,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    pub date: Option<String>,
    pub time: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration: i32,
    pub price: Decimal,
    pub topic: String,
    pub description: Option<String>,
    pub status: SessionStatus,
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSessionResponse {
    pub session: SessionResponse,
    pub conversation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub party: SessionParty,
    pub counterpart: String,
    pub avatar: String,
    pub topic: String,
    pub description: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration_minutes: i32,
    #[serde(rename = "type")]
    pub session_type: String,
    pub price: Decimal,
    pub status: String,
    pub meeting_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSessionResponse {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub mentor: String,
    pub mentee_id: Uuid,
    pub mentee: String,
    pub topic: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration_minutes: i32,
    #[serde(rename = "type")]
    pub session_type: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub remaining_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub id: Uuid,
    pub status: String,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub counterpart: String,
    pub last_message: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub mentor: PartyInfo,
    pub mentee: PartyInfo,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub is_read: bool,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub mentee: String,
    pub avatar: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub helpful_count: i32,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarBucket {
    pub stars: i32,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewStats {
    pub average: f64,
    pub total: usize,
    pub breakdown: Vec<StarBucket>,
    pub recommended: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorReviewsResponse {
    pub reviews: Vec<ReviewResponse>,
    pub stats: ReviewStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsStats {
    pub total_earnings: Decimal,
    pub this_month_earnings: Decimal,
    pub pending_payout: Decimal,
    pub average_rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Payment,
    Payout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub id: String,
    pub kind: TransactionKind,
    pub description: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_fee: Option<Decimal>,
    pub date: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextPayout {
    pub amount: Decimal,
    pub date: Option<DateTime<Utc>>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsOverviewResponse {
    pub stats: EarningsStats,
    pub transactions: Vec<TransactionEntry>,
    pub next_payout: NextPayout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutResponse {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Two-letter fallback avatar, the same rule the web client uses.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(|c| c.to_uppercase())
        .take(2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initials_take_first_two_words() {
        assert_eq!(initials("Ada Lovelace"), "AL");
        assert_eq!(initials("Ada"), "A");
        assert_eq!(initials("ada  maria lovelace"), "AM");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn party_resolves_by_mentor_id() {
        let mentor = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_eq!(SessionParty::resolve(mentor, mentor), SessionParty::Mentor);
        assert_eq!(SessionParty::resolve(mentor, other), SessionParty::Mentee);
    }
}
