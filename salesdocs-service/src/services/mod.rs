pub mod database;
pub mod lifecycle;
pub mod metrics;
pub mod numbering;
pub mod recurrence;
pub mod totals;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
