use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Mentee,
    Mentor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Mentee => "mentee",
            UserRole::Mentor => "mentor",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mentee" => Some(UserRole::Mentee),
            "mentor" => Some(UserRole::Mentor),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Video,
    Chat,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Video => "video",
            SessionType::Chat => "chat",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "video" => Some(SessionType::Video),
            "chat" => Some(SessionType::Chat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SessionStatus::Pending),
            "confirmed" => Some(SessionStatus::Confirmed),
            "completed" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            "rejected" => Some(SessionStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Rejected
        )
    }

    /// Allowed lifecycle moves: pending -> confirmed/rejected,
    /// confirmed -> completed/cancelled. Re-confirming a confirmed session
    /// is a permitted no-op (started_at and meeting_link are set only once).
    /// Everything else is refused.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Pending, SessionStatus::Confirmed)
                | (SessionStatus::Pending, SessionStatus::Rejected)
                | (SessionStatus::Confirmed, SessionStatus::Confirmed)
                | (SessionStatus::Confirmed, SessionStatus::Completed)
                | (SessionStatus::Confirmed, SessionStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Completed => "completed",
        }
    }

    /// Statuses that count against a mentor's available balance.
    pub fn in_flight_or_settled() -> [&'static str; 3] {
        ["pending", "processing", "completed"]
    }
}

// Common response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error_with_details(message: String, details: serde_json::Value) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            details: Some(details),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_splits_into_confirmed_or_rejected() {
        assert!(SessionStatus::Pending.can_transition_to(SessionStatus::Confirmed));
        assert!(SessionStatus::Pending.can_transition_to(SessionStatus::Rejected));
        assert!(!SessionStatus::Pending.can_transition_to(SessionStatus::Completed));
        assert!(!SessionStatus::Pending.can_transition_to(SessionStatus::Cancelled));
    }

    #[test]
    fn confirmed_splits_into_completed_or_cancelled() {
        assert!(SessionStatus::Confirmed.can_transition_to(SessionStatus::Completed));
        assert!(SessionStatus::Confirmed.can_transition_to(SessionStatus::Cancelled));
        assert!(!SessionStatus::Confirmed.can_transition_to(SessionStatus::Rejected));
        assert!(!SessionStatus::Confirmed.can_transition_to(SessionStatus::Pending));
    }

    #[test]
    fn reconfirmation_is_a_permitted_noop() {
        assert!(SessionStatus::Confirmed.can_transition_to(SessionStatus::Confirmed));
        assert!(!SessionStatus::Pending.can_transition_to(SessionStatus::Pending));
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for terminal in [
            SessionStatus::Completed,
            SessionStatus::Cancelled,
            SessionStatus::Rejected,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                SessionStatus::Pending,
                SessionStatus::Confirmed,
                SessionStatus::Completed,
                SessionStatus::Cancelled,
                SessionStatus::Rejected,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            SessionStatus::Pending,
            SessionStatus::Confirmed,
            SessionStatus::Completed,
            SessionStatus::Cancelled,
            SessionStatus::Rejected,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("archived"), None);
    }
}
