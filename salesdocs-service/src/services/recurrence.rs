//! Recurrence frequency arithmetic for recurring invoice templates.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// How often a recurring template stamps a new invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            "quarterly" => Some(Frequency::Quarterly),
            "yearly" => Some(Frequency::Yearly),
            _ => None,
        }
    }

    /// Next run date after `from`. Month-based frequencies clamp to the
    /// last day of shorter months (Jan 31 + 1 month = Feb 28/29).
    pub fn advance(&self, from: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Weekly => from + Days::new(7),
            Frequency::Monthly => from + Months::new(1),
            Frequency::Quarterly => from + Months::new(3),
            Frequency::Yearly => from + Months::new(12),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekly_adds_seven_days() {
        assert_eq!(
            Frequency::Weekly.advance(date(2026, 1, 28)),
            date(2026, 2, 4)
        );
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        assert_eq!(
            Frequency::Monthly.advance(date(2026, 1, 31)),
            date(2026, 2, 28)
        );
        // Leap year keeps the 29th.
        assert_eq!(
            Frequency::Monthly.advance(date(2028, 1, 31)),
            date(2028, 2, 29)
        );
    }

    #[test]
    fn quarterly_and_yearly_advance() {
        assert_eq!(
            Frequency::Quarterly.advance(date(2026, 11, 30)),
            date(2027, 2, 28)
        );
        assert_eq!(
            Frequency::Yearly.advance(date(2026, 3, 15)),
            date(2027, 3, 15)
        );
    }

    #[test]
    fn unknown_frequency_is_rejected() {
        assert_eq!(Frequency::from_string("fortnightly"), None);
        assert_eq!(Frequency::from_string("monthly"), Some(Frequency::Monthly));
    }
}
