//! Shared-secret bearer guard for internal endpoints.
//!
//! Scheduled-job routes are invoked by an external cron trigger, not by the
//! BFF, so they authenticate with a static shared secret instead of the
//! signed-request scheme. The comparison is constant-time.

use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Clone)]
pub struct SharedSecret(Arc<Secret<String>>);

impl SharedSecret {
    pub fn new(secret: Secret<String>) -> Self {
        Self(Arc::new(secret))
    }

    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.expose_secret().as_bytes();
        let presented = presented.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }
        expected.ct_eq(presented).into()
    }
}

/// Reject requests that do not carry `Authorization: Bearer <secret>`.
pub async fn require_bearer_secret(
    State(secret): State<SharedSecret>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing bearer credentials")))?;

    if !secret.matches(token) {
        return Err(AppError::AuthError(anyhow::anyhow!(
            "Invalid shared secret"
        )));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SharedSecret {
        SharedSecret::new(Secret::new(value.to_string()))
    }

    #[test]
    fn matching_secret_is_accepted() {
        assert!(secret("cron-secret-1").matches("cron-secret-1"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        assert!(!secret("cron-secret-1").matches("cron-secret-2"));
        assert!(!secret("cron-secret-1").matches(""));
        assert!(!secret("cron-secret-1").matches("cron-secret-1x"));
    }
}
