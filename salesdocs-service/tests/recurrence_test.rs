//! Recurrence and numbering behavior tests for salesdocs-service.

use chrono::NaiveDate;
use salesdocs_service::services::numbering::format_number;
use salesdocs_service::services::recurrence::Frequency;
use salesdocs_service::workers::outbox::{retry_delay_secs, MAX_ATTEMPTS};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn monthly_walk_from_month_end_stays_clamped() {
    // Once clamped to the 28th, the schedule stays on the 28th.
    let mut run = date(2026, 1, 31);
    let expected = [
        date(2026, 2, 28),
        date(2026, 3, 28),
        date(2026, 4, 28),
        date(2026, 5, 28),
    ];
    for want in expected {
        run = Frequency::Monthly.advance(run);
        assert_eq!(run, want);
    }
}

#[test]
fn quarterly_walk_covers_a_year() {
    let mut run = date(2026, 1, 15);
    for want in [
        date(2026, 4, 15),
        date(2026, 7, 15),
        date(2026, 10, 15),
        date(2027, 1, 15),
    ] {
        run = Frequency::Quarterly.advance(run);
        assert_eq!(run, want);
    }
}

#[test]
fn weekly_crosses_year_boundary() {
    assert_eq!(
        Frequency::Weekly.advance(date(2026, 12, 29)),
        date(2027, 1, 5)
    );
}

#[test]
fn yearly_handles_leap_day() {
    assert_eq!(
        Frequency::Yearly.advance(date(2028, 2, 29)),
        date(2029, 2, 28)
    );
}

#[test]
fn catching_up_one_period_per_sweep_converges() {
    // A template three months behind needs four sweeps: three catch-ups
    // plus the run due today.
    let today = date(2026, 6, 10);
    let mut next_run = date(2026, 3, 10);
    let mut sweeps = 0;
    while next_run <= today {
        next_run = Frequency::Monthly.advance(next_run);
        sweeps += 1;
    }
    assert_eq!(sweeps, 4);
    assert_eq!(next_run, date(2026, 7, 10));
}

#[test]
fn document_numbers_format_with_prefix_year_and_padding() {
    assert_eq!(format_number("OFF", 2026, 7), "OFF-2026-0007");
    assert_eq!(format_number("FAC", 2026, 123), "FAC-2026-0123");
    assert_eq!(format_number("CRE", 2027, 12345), "CRE-2027-12345");
}

#[test]
fn outbox_schedule_is_bounded() {
    let mut attempts = 1;
    let mut total_wait = 0;
    while let Some(delay) = retry_delay_secs(attempts) {
        total_wait += delay;
        attempts += 1;
    }
    assert_eq!(attempts, MAX_ATTEMPTS);
    assert_eq!(total_wait, 30 + 60 + 120);
}
