use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgPool;
use uuid::Uuid;

use mentorlink_common::{AppError, Clock, PayoutStatus};

use crate::config::PayoutConfig;
use crate::models::{
    EarningsOverviewResponse, EarningsStats, NextPayout, PayoutResponse, TransactionEntry,
    TransactionKind,
};
use crate::AppState;

pub struct EarningsService {
    db_pool: PgPool,
    clock: Arc<dyn Clock>,
    payouts: PayoutConfig,
}

impl EarningsService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            clock: state.clock.clone(),
            payouts: state.config.payouts.clone(),
        }
    }

    /// Earnings dashboard for a mentor: lifetime and month-to-date totals,
    /// recent ledger activity, and the next payout estimate.
    pub async fn overview(&self, mentor_id: Uuid) -> Result<EarningsOverviewResponse, AppError> {
        let now = self.clock.now();

        let totals: TotalsRow = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE status = 'completed'), 0) AS total_earnings,
                COALESCE(SUM(amount) FILTER (WHERE status = 'completed'
                    AND date_trunc('month', paid_at) = date_trunc('month', $2)), 0) AS this_month_earnings,
                AVG(amount) FILTER (WHERE status = 'completed') AS average_rate
            FROM payments
            WHERE mentor_id = $1
            "#,
        )
        .bind(mentor_id)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        let (pending_total,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0) FROM payouts
             WHERE mentor_id = $1 AND status = 'pending'",
        )
        .bind(mentor_id)
        .fetch_one(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        let earliest_pending: Option<EarliestPayoutRow> = sqlx::query_as(
            r#"
            SELECT amount, status, created_at FROM payouts
            WHERE mentor_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(mentor_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        let payment_rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT p.payment_id, p.amount, p.platform_fee, p.status,
                   p.paid_at, p.created_at, u.name AS payer_name, s.topic
            FROM payments p
            JOIN users u ON u.user_id = p.payer_id
            JOIN mentorship_sessions s ON s.session_id = p.session_id
            WHERE p.mentor_id = $1
            ORDER BY p.created_at DESC
            LIMIT 10
            "#,
        )
        .bind(mentor_id)
        .fetch_all(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        let payout_rows = sqlx::query_as::<_, PayoutRow>(
            r#"
            SELECT payout_id, amount, status, created_at
            FROM payouts
            WHERE mentor_id = $1
            ORDER BY created_at DESC
            LIMIT 5
            "#,
        )
        .bind(mentor_id)
        .fetch_all(&self.db_pool)
        .await
        .map_err(AppError::Database)?;

        let fee_percent = self.payouts.platform_fee_percent;
        let payments = payment_rows
            .into_iter()
            .map(|row| TransactionEntry {
                id: row.payment_id.to_string(),
                kind: TransactionKind::Payment,
                description: format!("Session with {}: {}", row.payer_name, row.topic),
                amount: row.amount,
                platform_fee: Some(effective_platform_fee(
                    row.amount,
                    row.platform_fee,
                    fee_percent,
                )),
                date: row.paid_at.unwrap_or(row.created_at),
                status: row.status,
            })
            .collect();

        let payouts = payout_rows
            .into_iter()
            .map(|row| TransactionEntry {
                id: row.payout_id.to_string(),
                kind: TransactionKind::Payout,
                description: "Withdrawal".to_string(),
                amount: row.amount,
                platform_fee: None,
                date: row.created_at,
                status: row.status,
            })
            .collect();

        Ok(EarningsOverviewResponse {
            stats: EarningsStats {
                total_earnings: totals.total_earnings,
                this_month_earnings: totals.this_month_earnings,
                pending_payout: pending_total,
                average_rate: totals
                    .average_rate
                    .unwrap_or(Decimal::ZERO)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            },
            transactions: merge_transactions(payments, payouts),
            next_payout: next_payout(earliest_pending, self.payouts.payout_delay_days),
        })
    }

    /// Requests a payout against the mentor's available balance. The balance
    /// read and the payout insert run in one transaction so two concurrent
    /// withdrawals cannot both pass the check.
    pub async fn withdraw(
        &self,
        mentor_id: Uuid,
        requested: Option<Decimal>,
    ) -> Result<PayoutResponse, AppError> {
        let mut tx = self.db_pool.begin().await.map_err(AppError::Database)?;

        let (earned,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0) FROM payments
             WHERE mentor_id = $1 AND status = 'completed'",
        )
        .bind(mentor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let reserved_statuses: Vec<String> = PayoutStatus::in_flight_or_settled()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (paid_out,): (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0) FROM payouts
             WHERE mentor_id = $1 AND status = ANY($2)",
        )
        .bind(mentor_id)
        .bind(&reserved_statuses)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let available = earned - paid_out;
        let amount = validate_withdrawal(requested, available)?;

        let payout_id = Uuid::new_v4();
        let now = self.clock.now();
        sqlx::query(
            r#"
            INSERT INTO payouts (payout_id, mentor_id, amount, status, created_at)
            VALUES ($1, $2, $3, 'pending', $4)
            "#,
        )
        .bind(payout_id)
        .bind(mentor_id)
        .bind(amount)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            payout_id = %payout_id,
            mentor_id = %mentor_id,
            amount = %amount,
            "payout requested"
        );

        Ok(PayoutResponse {
            id: payout_id,
            mentor_id,
            amount,
            status: PayoutStatus::Pending.as_str().to_string(),
            created_at: now,
        })
    }
}

/// Stored zero fees are legacy rows from before fees were recorded; they
/// report the configured percentage of the payment amount instead.
pub(crate) fn effective_platform_fee(
    amount: Decimal,
    stored: Decimal,
    fee_percent: Decimal,
) -> Decimal {
    if stored.is_zero() {
        (amount * fee_percent / Decimal::from(100))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    } else {
        stored
    }
}

/// Resolves the requested amount against the available balance. No amount
/// means "withdraw everything".
pub(crate) fn validate_withdrawal(
    requested: Option<Decimal>,
    available: Decimal,
) -> Result<Decimal, AppError> {
    let amount = requested.unwrap_or(available);
    if amount <= Decimal::ZERO {
        return Err(AppError::InvalidState(
            "No funds available for withdrawal".to_string(),
        ));
    }
    if amount > available {
        return Err(AppError::InsufficientBalance { available });
    }
    Ok(amount)
}

pub(crate) fn merge_transactions(
    payments: Vec<TransactionEntry>,
    payouts: Vec<TransactionEntry>,
) -> Vec<TransactionEntry> {
    let mut merged = payments;
    merged.extend(payouts);
    merged.sort_by(|a, b| b.date.cmp(&a.date));
    merged
}

/// Display estimate built from the oldest payout still pending: its own
/// amount and stored status, due `delay_days` after it was requested.
pub(crate) fn next_payout(earliest_pending: Option<EarliestPayoutRow>, delay_days: i64) -> NextPayout {
    match earliest_pending {
        Some(payout) => NextPayout {
            amount: payout.amount,
            date: Some(payout.created_at + Duration::days(delay_days)),
            status: payout.status,
        },
        None => NextPayout {
            amount: Decimal::ZERO,
            date: None,
            status: "No pending payouts".to_string(),
        },
    }
}

#[derive(sqlx::FromRow)]
struct TotalsRow {
    total_earnings: Decimal,
    this_month_earnings: Decimal,
    average_rate: Option<Decimal>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct EarliestPayoutRow {
    pub(crate) amount: Decimal,
    pub(crate) status: String,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    amount: Decimal,
    platform_fee: Decimal,
    status: String,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    payer_name: String,
    topic: String,
}

#[derive(sqlx::FromRow)]
struct PayoutRow {
    payout_id: Uuid,
    amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn withdrawing_nothing_takes_the_full_balance() {
        assert_eq!(
            validate_withdrawal(None, dec("150.00")).unwrap(),
            dec("150.00")
        );
    }

    #[test]
    fn withdrawing_with_an_empty_balance_is_rejected() {
        assert!(matches!(
            validate_withdrawal(None, Decimal::ZERO),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn zero_or_negative_requests_are_rejected() {
        assert!(matches!(
            validate_withdrawal(Some(Decimal::ZERO), dec("100")),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            validate_withdrawal(Some(dec("-5")), dec("100")),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn overdrawing_reports_the_available_balance() {
        match validate_withdrawal(Some(dec("200")), dec("120.50")) {
            Err(AppError::InsufficientBalance { available }) => {
                assert_eq!(available, dec("120.50"));
            }
            other => panic!("expected insufficient balance, got {:?}", other),
        }
    }

    #[test]
    fn partial_withdrawal_within_balance_passes() {
        assert_eq!(
            validate_withdrawal(Some(dec("50")), dec("120.50")).unwrap(),
            dec("50")
        );
    }

    #[test]
    fn zero_stored_fee_falls_back_to_the_percentage() {
        assert_eq!(
            effective_platform_fee(dec("80.00"), Decimal::ZERO, dec("10")),
            dec("8.00")
        );
        assert_eq!(
            effective_platform_fee(dec("80.00"), dec("5.25"), dec("10")),
            dec("5.25")
        );
    }

    #[test]
    fn transactions_merge_newest_first() {
        let at = |h| Utc.with_ymd_and_hms(2026, 8, 1, h, 0, 0).unwrap();
        let entry = |id: &str, kind, date| TransactionEntry {
            id: id.to_string(),
            kind,
            description: String::new(),
            amount: Decimal::ONE,
            platform_fee: None,
            date,
            status: "completed".to_string(),
        };

        let merged = merge_transactions(
            vec![
                entry("p2", TransactionKind::Payment, at(12)),
                entry("p1", TransactionKind::Payment, at(8)),
            ],
            vec![entry("w1", TransactionKind::Payout, at(10))],
        );

        let ids: Vec<&str> = merged.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "w1", "p1"]);
    }

    #[test]
    fn next_payout_reports_the_earliest_pending_payout_itself() {
        let created = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
        let next = next_payout(
            Some(EarliestPayoutRow {
                amount: dec("90.00"),
                status: "pending".to_string(),
                created_at: created,
            }),
            7,
        );
        assert_eq!(next.amount, dec("90.00"));
        assert_eq!(next.date, Some(created + Duration::days(7)));
        assert_eq!(next.status, "pending");
    }

    #[test]
    fn no_pending_payouts_reports_an_empty_estimate() {
        let next = next_payout(None, 7);
        assert_eq!(next.amount, Decimal::ZERO);
        assert!(next.date.is_none());
        assert_eq!(next.status, "No pending payouts");
    }
}
