//! Super-admin extractor for platform operator routes.
//!
//! The allowlist comes from `SUPER_ADMIN_EMAILS`, loaded once at startup
//! into an immutable set. The BFF forwards the authenticated user's email
//! in `X-User-Email`; there is no runtime mutation of the allowlist.

use crate::startup::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use platform_core::error::AppError;

/// Authenticated platform operator.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let email = parts
            .headers
            .get("X-User-Email")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_lowercase())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing X-User-Email header (required from BFF)"
                ))
            })?;

        if !state.config.super_admin_emails.contains(&email) {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Not a platform administrator"
            )));
        }

        Ok(AdminUser { email })
    }
}
