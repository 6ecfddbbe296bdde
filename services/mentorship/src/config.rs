use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mentorlink_common::{DatabaseConfig, JwtConfig, RedisConfig, ServerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub booking: BookingConfig,
    pub payouts: PayoutConfig,
}

/// Defaults applied once at the booking workflow boundary when the request
/// omits optional fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    pub default_duration_minutes: i32,
    pub default_topic: String,
    pub meeting_link_host: String,
    pub meeting_room_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Display estimate only: earliest pending payout + this many days.
    pub payout_delay_days: i64,
    /// Fee percentage reported when a payment row carries a zero fee.
    pub platform_fee_percent: Decimal,
    /// Per-sender message rate limit (messages per minute).
    pub message_rate_limit_per_minute: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .unwrap_or(8000),
                cors_origins: std::env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            database: DatabaseConfig {
                host: std::env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: std::env::var("DATABASE_PORT")
                    .unwrap_or_else(|_| "5432".to_string())
                    .parse()
                    .unwrap_or(5432),
                username: std::env::var("DATABASE_USERNAME")
                    .unwrap_or_else(|_| "mentorlink_user".to_string()),
                password: std::env::var("DATABASE_PASSWORD")
                    .unwrap_or_else(|_| "mentorlink_password".to_string()),
                database: std::env::var("DATABASE_NAME")
                    .unwrap_or_else(|_| "mentorlink".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            redis: RedisConfig {
                host: std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: std::env::var("REDIS_PORT")
                    .unwrap_or_else(|_| "6379".to_string())
                    .parse()
                    .unwrap_or(6379),
                password: std::env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
                database: std::env::var("REDIS_DATABASE")
                    .unwrap_or_else(|_| "0".to_string())
                    .parse()
                    .unwrap_or(0),
            },
            jwt: JwtConfig {
                secret: std::env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "dev-secret-key-change-in-production".to_string()),
                expiration_hours: std::env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .unwrap_or(24),
                issuer: std::env::var("JWT_ISSUER")
                    .unwrap_or_else(|_| "mentorlink".to_string()),
            },
            booking: BookingConfig {
                default_duration_minutes: std::env::var("BOOKING_DEFAULT_DURATION_MINUTES")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                default_topic: std::env::var("BOOKING_DEFAULT_TOPIC")
                    .unwrap_or_else(|_| "Mentorship Session".to_string()),
                meeting_link_host: std::env::var("MEETING_LINK_HOST")
                    .unwrap_or_else(|_| "https://meet.jit.si".to_string()),
                meeting_room_prefix: std::env::var("MEETING_ROOM_PREFIX")
                    .unwrap_or_else(|_| "MentorLink".to_string()),
            },
            payouts: PayoutConfig {
                payout_delay_days: std::env::var("PAYOUT_DELAY_DAYS")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()
                    .unwrap_or(7),
                platform_fee_percent: std::env::var("PLATFORM_FEE_PERCENT")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(Decimal::new(10, 0)),
                message_rate_limit_per_minute: std::env::var("MESSAGE_RATE_LIMIT_PER_MINUTE")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_booking_policy() {
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.booking.default_duration_minutes, 60);
        assert_eq!(config.booking.default_topic, "Mentorship Session");
        assert_eq!(config.booking.meeting_link_host, "https://meet.jit.si");
        assert_eq!(config.payouts.payout_delay_days, 7);
        assert_eq!(config.payouts.platform_fee_percent, Decimal::new(10, 0));
    }
}
