//! Document lifecycle tests for salesdocs-service.
//! Happy paths walk every allowed transition; guard tests pin the error
//! shape for the rest.

use chrono::NaiveDate;
use salesdocs_service::models::credit_note::CreditNoteStatus;
use salesdocs_service::models::invoice::InvoiceStatus;
use salesdocs_service::models::quotation::QuotationStatus;
use salesdocs_service::services::lifecycle::{LifecycleError, StatusMachine};

#[test]
fn quotation_happy_path_to_accepted() {
    let mut status = QuotationStatus::Draft;
    for next in [QuotationStatus::Sent, QuotationStatus::Accepted] {
        status.ensure_transition(next).unwrap();
        status = next;
    }
    assert!(status.is_terminal());
}

#[test]
fn invoice_happy_path_to_paid() {
    let mut status = InvoiceStatus::Draft;
    for next in [
        InvoiceStatus::Sent,
        InvoiceStatus::Viewed,
        InvoiceStatus::Paid,
    ] {
        status.ensure_transition(next).unwrap();
        status = next;
    }
    assert!(status.is_terminal());
}

#[test]
fn invoice_can_be_paid_without_view_tracking() {
    InvoiceStatus::Sent
        .ensure_transition(InvoiceStatus::Paid)
        .unwrap();
}

#[test]
fn credit_note_settles_either_way() {
    CreditNoteStatus::Issued
        .ensure_transition(CreditNoteStatus::Applied)
        .unwrap();
    CreditNoteStatus::Issued
        .ensure_transition(CreditNoteStatus::Refunded)
        .unwrap();
}

#[test]
fn draft_cannot_skip_ahead() {
    assert!(QuotationStatus::Draft
        .ensure_transition(QuotationStatus::Accepted)
        .is_err());
    assert!(InvoiceStatus::Draft
        .ensure_transition(InvoiceStatus::Paid)
        .is_err());
    assert!(CreditNoteStatus::Draft
        .ensure_transition(CreditNoteStatus::Applied)
        .is_err());
}

#[test]
fn decided_documents_cannot_move() {
    for terminal in [
        QuotationStatus::Accepted,
        QuotationStatus::Rejected,
        QuotationStatus::Expired,
    ] {
        assert!(terminal.is_terminal());
        assert!(terminal.ensure_transition(QuotationStatus::Sent).is_err());
    }
}

#[test]
fn rejected_transition_reports_states() {
    let err = InvoiceStatus::Paid
        .ensure_transition(InvoiceStatus::Cancelled)
        .unwrap_err();
    assert_eq!(
        err,
        LifecycleError::InvalidTransition {
            document: "invoice",
            from: "paid",
            to: "cancelled",
        }
    );
    assert_eq!(
        err.to_string(),
        "invalid invoice transition: paid -> cancelled"
    );
}

#[test]
fn effective_status_tracks_the_calendar() {
    let due = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();

    let before = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
    let after = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();

    assert_eq!(InvoiceStatus::Sent.effective(Some(due), before), "sent");
    assert_eq!(InvoiceStatus::Sent.effective(Some(due), after), "overdue");
    assert_eq!(InvoiceStatus::Viewed.effective(Some(due), after), "overdue");
    assert_eq!(InvoiceStatus::Paid.effective(Some(due), after), "paid");
}

#[test]
fn status_strings_round_trip() {
    for status in [
        QuotationStatus::Draft,
        QuotationStatus::Sent,
        QuotationStatus::Accepted,
        QuotationStatus::Rejected,
        QuotationStatus::Expired,
    ] {
        assert_eq!(QuotationStatus::from_string(status.as_str()), status);
    }
    for status in [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Viewed,
        InvoiceStatus::Paid,
        InvoiceStatus::Cancelled,
    ] {
        assert_eq!(InvoiceStatus::from_string(status.as_str()), status);
    }
}
