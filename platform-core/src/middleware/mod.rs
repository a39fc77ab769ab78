pub mod metrics;
pub mod secret;
pub mod tracing;
