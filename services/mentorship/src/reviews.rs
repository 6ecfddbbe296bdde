use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgPool;
use uuid::Uuid;

use mentorlink_common::{AppError, Clock, SessionStatus};

use crate::models::{
    CreateReviewRequest, MentorReviewsResponse, ReviewResponse, ReviewStats, StarBucket,
};
use crate::AppState;

pub struct ReviewService {
    db_pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl ReviewService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Stores the mentee's review for a session and rewrites the mentor's
    /// cached rating in the same transaction. Rating a still-confirmed
    /// session completes it first, so a mentee rating from the chat timer
    /// does not need a separate completion call.
    pub async fn store(
        &self,
        caller: Uuid,
        req: CreateReviewRequest,
    ) -> Result<ReviewResponse, AppError> {
        let mut tx = self.db_pool.begin().await.map_err(AppError::Database)?;

        let session: SessionRow = sqlx::query_as(
            "SELECT session_id, mentor_id, mentee_id, status
             FROM mentorship_sessions WHERE session_id = $1 FOR UPDATE",
        )
        .bind(req.session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

        if session.mentee_id != caller {
            return Err(AppError::Authorization(
                "Only the mentee can review this session".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut status = session.status.clone();
        if status == SessionStatus::Confirmed.as_str() {
            sqlx::query(
                "UPDATE mentorship_sessions SET status = 'completed', ended_at = $1
                 WHERE session_id = $2",
            )
            .bind(now)
            .bind(session.session_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
            status = SessionStatus::Completed.as_str().to_string();
        }

        if status != SessionStatus::Completed.as_str() {
            return Err(AppError::InvalidState(
                "Only completed sessions can be reviewed".to_string(),
            ));
        }

        let already_reviewed: Option<(Uuid,)> =
            sqlx::query_as("SELECT review_id FROM reviews WHERE session_id = $1")
                .bind(session.session_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::Database)?;
        if already_reviewed.is_some() {
            return Err(AppError::Conflict(
                "This session has already been reviewed".to_string(),
            ));
        }

        let review_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO reviews
                (review_id, session_id, mentor_id, mentee_id, rating, comment,
                 helpful_count, is_verified, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, true, $7)
            "#,
        )
        .bind(review_id)
        .bind(session.session_id)
        .bind(session.mentor_id)
        .bind(session.mentee_id)
        .bind(req.rating)
        .bind(&req.comment)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        // Materialized aggregate on the mentor row, recomputed from scratch
        // so it can never drift from the review table.
        let (average, count): (Option<Decimal>, i64) = sqlx::query_as(
            "SELECT AVG(rating)::numeric, COUNT(*) FROM reviews WHERE mentor_id = $1",
        )
        .bind(session.mentor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let rating = cached_rating(average.unwrap_or(Decimal::ZERO));
        sqlx::query("UPDATE users SET rating = $1, review_count = $2, updated_at = $3 WHERE user_id = $4")
            .bind(rating)
            .bind(count as i32)
            .bind(now)
            .bind(session.mentor_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            review_id = %review_id,
            mentor_id = %session.mentor_id,
            rating = req.rating,
            "review stored"
        );

        let mentee = crate::sessions::fetch_party(&self.db_pool, session.mentee_id).await?;

        Ok(ReviewResponse {
            id: review_id,
            session_id: session.session_id,
            avatar: crate::models::initials(&mentee.name),
            mentee: mentee.name,
            rating: req.rating,
            comment: req.comment,
            helpful_count: 0,
            verified: true,
            created_at: now,
        })
    }

    /// Public review listing for a mentor, with the star breakdown computed
    /// from the full rating set.
    pub async fn mentor_reviews(&self, mentor_id: Uuid) -> Result<MentorReviewsResponse, AppError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT r.review_id, r.session_id, r.rating, r.comment,
                   r.helpful_count, r.is_verified, r.created_at,
                   u.name AS mentee_name
            FROM reviews r
            JOIN users u ON u.user_id = r.mentee_id
            WHERE r.mentor_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(mentor_id)
        .fetch_all(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        let ratings: Vec<i32> = rows.iter().map(|row| row.rating).collect();
        let stats = build_review_stats(&ratings);

        let reviews = rows
            .into_iter()
            .map(|row| ReviewResponse {
                id: row.review_id,
                session_id: row.session_id,
                avatar: crate::models::initials(&row.mentee_name),
                mentee: row.mentee_name,
                rating: row.rating,
                comment: row.comment,
                helpful_count: row.helpful_count,
                verified: row.is_verified,
                created_at: row.created_at,
            })
            .collect();

        Ok(MentorReviewsResponse { reviews, stats })
    }
}

/// The mentor-row rating cache keeps two decimals, rounding halves away
/// from zero so 4.125 caches as 4.13.
pub(crate) fn cached_rating(average: Decimal) -> Decimal {
    average.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Aggregate stats over a rating set. `recommended` is the share of four
/// and five star ratings, as a rounded percentage.
pub(crate) fn build_review_stats(ratings: &[i32]) -> ReviewStats {
    let total = ratings.len();
    if total == 0 {
        return ReviewStats {
            average: 0.0,
            total: 0,
            breakdown: (1..=5)
                .rev()
                .map(|stars| StarBucket {
                    stars,
                    count: 0,
                    percentage: 0,
                })
                .collect(),
            recommended: 0,
        };
    }

    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    let average = (sum as f64 / total as f64 * 10.0).round() / 10.0;

    let breakdown = (1..=5)
        .rev()
        .map(|stars| {
            let count = ratings.iter().filter(|&&r| r == stars).count();
            StarBucket {
                stars,
                count,
                percentage: ((count * 100) as f64 / total as f64).round() as u32,
            }
        })
        .collect();

    let favorable = ratings.iter().filter(|&&r| r >= 4).count();
    let recommended = ((favorable * 100) as f64 / total as f64).round() as u32;

    ReviewStats {
        average,
        total,
        breakdown,
        recommended,
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    mentor_id: Uuid,
    mentee_id: Uuid,
    status: String,
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    review_id: Uuid,
    session_id: Uuid,
    rating: i32,
    comment: Option<String>,
    helpful_count: i32,
    is_verified: bool,
    created_at: DateTime<Utc>,
    mentee_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stats_over_a_mixed_rating_set() {
        let stats = build_review_stats(&[5, 5, 4, 3, 1]);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.average, 3.6);
        assert_eq!(stats.recommended, 60);

        let five = &stats.breakdown[0];
        assert_eq!((five.stars, five.count, five.percentage), (5, 2, 40));
        let one = &stats.breakdown[4];
        assert_eq!((one.stars, one.count, one.percentage), (1, 1, 20));
    }

    #[test]
    fn empty_rating_set_yields_zeros() {
        let stats = build_review_stats(&[]);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.recommended, 0);
        assert_eq!(stats.breakdown.len(), 5);
        assert!(stats.breakdown.iter().all(|b| b.count == 0 && b.percentage == 0));
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        // 4 + 4 + 5 = 13 / 3 = 4.333... -> 4.3
        let stats = build_review_stats(&[4, 4, 5]);
        assert_eq!(stats.average, 4.3);
    }

    #[test]
    fn cached_rating_rounds_halves_up() {
        assert_eq!(
            cached_rating(Decimal::from_str("4.125").unwrap()),
            Decimal::from_str("4.13").unwrap()
        );
        assert_eq!(
            cached_rating(Decimal::from_str("4.333333").unwrap()),
            Decimal::from_str("4.33").unwrap()
        );
    }
}
