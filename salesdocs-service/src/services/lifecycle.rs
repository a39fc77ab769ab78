//! Status machines for the three document types.
//!
//! Transition tables live on the status enums (`StatusMachine::next_states`);
//! this module owns the shared guard and the error a rejected transition
//! raises. Terminal states have an empty transition table, so a cancelled
//! or settled document can never move again.

use platform_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid {document} transition: {from} -> {to}")]
    InvalidTransition {
        document: &'static str,
        from: &'static str,
        to: &'static str,
    },
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        AppError::Conflict(anyhow::Error::new(err))
    }
}

/// Implemented by each document status enum.
pub trait StatusMachine: Copy + PartialEq + Sized + 'static {
    const DOCUMENT: &'static str;

    fn name(&self) -> &'static str;

    /// States directly reachable from `self`. Empty for terminal states.
    fn next_states(&self) -> &'static [Self];

    fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }

    fn can_transition(&self, to: Self) -> bool {
        self.next_states().contains(&to)
    }

    /// Guard a requested transition, naming current and requested state
    /// on rejection.
    fn ensure_transition(&self, to: Self) -> Result<(), LifecycleError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                document: Self::DOCUMENT,
                from: self.name(),
                to: to.name(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credit_note::CreditNoteStatus;
    use crate::models::invoice::InvoiceStatus;
    use crate::models::quotation::QuotationStatus;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Every pair outside the allowed table must be rejected, every pair
    /// inside it accepted.
    fn assert_exhaustive<S: StatusMachine + std::fmt::Debug>(all: &[S]) {
        for &from in all {
            for &to in all {
                let allowed = from.next_states().contains(&to);
                let result = from.ensure_transition(to);
                if allowed {
                    assert!(result.is_ok(), "{:?} -> {:?} should be legal", from, to);
                } else {
                    assert_eq!(
                        result,
                        Err(LifecycleError::InvalidTransition {
                            document: S::DOCUMENT,
                            from: from.name(),
                            to: to.name(),
                        }),
                        "{:?} -> {:?} should be rejected",
                        from,
                        to
                    );
                }
            }
        }
    }

    #[test]
    fn quotation_table_is_enforced_exhaustively() {
        assert_exhaustive(&[
            QuotationStatus::Draft,
            QuotationStatus::Sent,
            QuotationStatus::Accepted,
            QuotationStatus::Rejected,
            QuotationStatus::Expired,
        ]);
    }

    #[test]
    fn invoice_table_is_enforced_exhaustively() {
        assert_exhaustive(&[
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Viewed,
            InvoiceStatus::Paid,
            InvoiceStatus::Cancelled,
        ]);
    }

    #[test]
    fn credit_note_table_is_enforced_exhaustively() {
        assert_exhaustive(&[
            CreditNoteStatus::Draft,
            CreditNoteStatus::Issued,
            CreditNoteStatus::Applied,
            CreditNoteStatus::Refunded,
            CreditNoteStatus::Cancelled,
        ]);
    }

    #[test]
    fn cancelled_invoice_accepts_no_transition() {
        assert!(InvoiceStatus::Cancelled.is_terminal());
        for to in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Viewed,
            InvoiceStatus::Paid,
        ] {
            assert!(InvoiceStatus::Cancelled.ensure_transition(to).is_err());
        }
    }

    #[test]
    fn invalid_transition_names_both_states() {
        let err = QuotationStatus::Draft
            .ensure_transition(QuotationStatus::Accepted)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid quotation transition: draft -> accepted"
        );
    }

    #[test]
    fn overdue_is_derived_not_stored() {
        let due = Some(date(2026, 1, 31));

        // Past due and open: overdue at read time.
        assert_eq!(
            InvoiceStatus::Sent.effective(due, date(2026, 2, 1)),
            "overdue"
        );
        assert_eq!(
            InvoiceStatus::Viewed.effective(due, date(2026, 2, 1)),
            "overdue"
        );

        // On or before due date: stored status.
        assert_eq!(InvoiceStatus::Sent.effective(due, date(2026, 1, 31)), "sent");

        // Paid, cancelled and draft invoices never read as overdue.
        assert_eq!(InvoiceStatus::Paid.effective(due, date(2026, 2, 1)), "paid");
        assert_eq!(
            InvoiceStatus::Cancelled.effective(due, date(2026, 2, 1)),
            "cancelled"
        );
        assert_eq!(
            InvoiceStatus::Draft.effective(due, date(2026, 2, 1)),
            "draft"
        );

        // No due date: nothing to derive from.
        assert_eq!(InvoiceStatus::Sent.effective(None, date(2026, 2, 1)), "sent");
    }
}
