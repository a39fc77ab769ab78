//! Workspace context extractor for multi-tenancy support.
//!
//! The BFF authenticates the user, resolves their workspace membership and
//! forwards the workspace identity in the `X-Workspace-ID` header. Every
//! tenant-scoped query filters on this id.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use platform_core::error::AppError;
use uuid::Uuid;

/// Workspace (tenant) identity extracted from request headers.
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceContext {
    pub workspace_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for WorkspaceContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("X-Workspace-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing X-Workspace-ID header (required from BFF)"
                ))
            })?;

        let workspace_id = Uuid::parse_str(raw).map_err(|_| {
            AppError::AuthError(anyhow::anyhow!("Invalid X-Workspace-ID header"))
        })?;

        let span = tracing::Span::current();
        span.record("workspace_id", raw);

        Ok(WorkspaceContext { workspace_id })
    }
}
