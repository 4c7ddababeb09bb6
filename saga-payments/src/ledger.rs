//! Double-entry ledger posting against the fixed chart of accounts named in
//! `spec.md` §3/§4.8: `AR`, `PSP_CLEARING`, `REVENUE`, `REFUNDS_PAYABLE`.

use chrono::{NaiveDate, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::PaymentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Account {
    Ar,
    PspClearing,
    Revenue,
    RefundsPayable,
}

impl Account {
    fn as_str(self) -> &'static str {
        match self {
            Account::Ar => "AR",
            Account::PspClearing => "PSP_CLEARING",
            Account::Revenue => "REVENUE",
            Account::RefundsPayable => "REFUNDS_PAYABLE",
        }
    }
}

/// One side of a journal entry. A journal is exactly two lines: one debit,
/// one credit, equal amount, same currency (`spec.md` §4.8).
pub struct LedgerLine {
    pub account: Account,
    pub debit_minor: i64,
    pub credit_minor: i64,
    pub capture_id: Option<Uuid>,
    pub refund_id: Option<Uuid>,
}

impl LedgerLine {
    fn debit(account: Account, amount_minor: i64) -> Self {
        Self {
            account,
            debit_minor: amount_minor,
            credit_minor: 0,
            capture_id: None,
            refund_id: None,
        }
    }

    fn credit(account: Account, amount_minor: i64) -> Self {
        Self {
            account,
            debit_minor: 0,
            credit_minor: amount_minor,
            capture_id: None,
            refund_id: None,
        }
    }
}

pub struct Ledger;

impl Ledger {
    /// Posts a balanced two-line journal within `tx` and returns its
    /// `journal_id`. Rejects unbalanced journals with
    /// `CoreError::InvariantViolation` (`spec.md` §4.8).
    #[tracing::instrument(skip_all, name = "ledger.post", fields(tenant_id, payment_id = %payment_id))]
    pub async fn post(
        tx: &mut PgConnection,
        tenant_id: &str,
        payment_id: Uuid,
        currency_code: &str,
        booking_date: NaiveDate,
        lines: [LedgerLine; 2],
    ) -> Result<Uuid, PaymentError> {
        let total_debit: i64 = lines.iter().map(|line| line.debit_minor).sum();
        let total_credit: i64 = lines.iter().map(|line| line.credit_minor).sum();
        if total_debit != total_credit || total_debit <= 0 {
            return Err(PaymentError::Invariant(format!(
                "unbalanced journal for payment {payment_id}: debit={total_debit} credit={total_credit}"
            )));
        }

        let journal_id = Uuid::new_v4();
        let now = Utc::now();
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO ledger_entries (
                    id, tenant_id, journal_id, account_code, currency_code,
                    debit_minor, credit_minor, payment_id, capture_id, refund_id,
                    booking_date, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(journal_id)
            .bind(line.account.as_str())
            .bind(currency_code)
            .bind(line.debit_minor)
            .bind(line.credit_minor)
            .bind(payment_id)
            .bind(line.capture_id)
            .bind(line.refund_id)
            .bind(booking_date)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        Ok(journal_id)
    }

    /// `AR` ↔ `PSP_CLEARING` for the authorized amount.
    pub async fn post_authorization(
        tx: &mut PgConnection,
        tenant_id: &str,
        payment_id: Uuid,
        amount_minor: i64,
        currency_code: &str,
        booking_date: NaiveDate,
    ) -> Result<Uuid, PaymentError> {
        Self::post(
            tx,
            tenant_id,
            payment_id,
            currency_code,
            booking_date,
            [
                LedgerLine::debit(Account::Ar, amount_minor),
                LedgerLine::credit(Account::PspClearing, amount_minor),
            ],
        )
        .await
    }

    /// `PSP_CLEARING` ↔ `REVENUE` for the captured amount.
    pub async fn post_capture(
        tx: &mut PgConnection,
        tenant_id: &str,
        payment_id: Uuid,
        capture_id: Uuid,
        amount_minor: i64,
        currency_code: &str,
        booking_date: NaiveDate,
    ) -> Result<Uuid, PaymentError> {
        Self::post(
            tx,
            tenant_id,
            payment_id,
            currency_code,
            booking_date,
            [
                LedgerLine {
                    capture_id: Some(capture_id),
                    ..LedgerLine::debit(Account::PspClearing, amount_minor)
                },
                LedgerLine {
                    capture_id: Some(capture_id),
                    ..LedgerLine::credit(Account::Revenue, amount_minor)
                },
            ],
        )
        .await
    }

    /// `REFUNDS_PAYABLE` ↔ `PSP_CLEARING` for the refunded amount.
    pub async fn post_refund(
        tx: &mut PgConnection,
        tenant_id: &str,
        payment_id: Uuid,
        refund_id: Uuid,
        amount_minor: i64,
        currency_code: &str,
        booking_date: NaiveDate,
    ) -> Result<Uuid, PaymentError> {
        Self::post(
            tx,
            tenant_id,
            payment_id,
            currency_code,
            booking_date,
            [
                LedgerLine {
                    refund_id: Some(refund_id),
                    ..LedgerLine::debit(Account::RefundsPayable, amount_minor)
                },
                LedgerLine {
                    refund_id: Some(refund_id),
                    ..LedgerLine::credit(Account::PspClearing, amount_minor)
                },
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_and_credit_lines_balance() {
        let lines = [
            LedgerLine::debit(Account::Ar, 500),
            LedgerLine::credit(Account::PspClearing, 500),
        ];
        let total_debit: i64 = lines.iter().map(|l| l.debit_minor).sum();
        let total_credit: i64 = lines.iter().map(|l| l.credit_minor).sum();
        assert_eq!(total_debit, total_credit);
    }

    #[test]
    fn account_codes_match_the_fixed_chart() {
        assert_eq!(Account::Ar.as_str(), "AR");
        assert_eq!(Account::PspClearing.as_str(), "PSP_CLEARING");
        assert_eq!(Account::Revenue.as_str(), "REVENUE");
        assert_eq!(Account::RefundsPayable.as_str(), "REFUNDS_PAYABLE");
    }
}
