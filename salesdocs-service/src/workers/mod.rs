pub mod outbox;
pub mod recurring;
pub mod reminders;

pub use outbox::{OutboxProcessor, OutboxRunSummary};
pub use recurring::{RecurringRunner, RecurringRunSummary};
pub use reminders::{ReminderSweep, ReminderRunSummary};
