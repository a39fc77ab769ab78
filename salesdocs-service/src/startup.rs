//! Application startup and lifecycle management.

use crate::config::SalesdocsConfig;
use crate::handlers::{
    admin, credit_notes, cron, health, invoices, products, quotations, recurring, settings,
};
use crate::services::{init_metrics, Database};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use platform_core::error::AppError;
use platform_core::middleware::metrics::metrics_middleware;
use platform_core::middleware::secret::{require_bearer_secret, SharedSecret};
use platform_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: SalesdocsConfig,
    pub db: Arc<Database>,
    pub http_client: reqwest::Client,
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: SalesdocsConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: SalesdocsConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(
        config: SalesdocsConfig,
        run_migrations: bool,
    ) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let state = AppState {
            config: config.clone(),
            db: Arc::new(db),
            http_client: reqwest::Client::new(),
        };

        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Salesdocs service listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let cron_guard = SharedSecret::new(self.state.config.cron_secret.clone());

        // Scheduled-job triggers authenticate with the shared cron secret,
        // not with BFF headers.
        let cron_routes = Router::new()
            .route("/cron/recurring-invoices", post(cron::run_recurring_invoices))
            .route("/cron/reminders", post(cron::run_reminders))
            .route("/cron/outbox", post(cron::run_outbox))
            .layer(middleware::from_fn_with_state(
                cron_guard,
                require_bearer_secret,
            ));

        let router = Router::new()
            .route("/health", get(health::health_check))
            .route("/ready", get(health::readiness_check))
            .route("/metrics", get(health::metrics_handler))
            // Products
            .route(
                "/products",
                post(products::create_product).get(products::list_products),
            )
            .route(
                "/products/:id",
                get(products::get_product)
                    .patch(products::update_product)
                    .delete(products::delete_product),
            )
            // Quotations
            .route(
                "/quotations",
                post(quotations::create_quotation).get(quotations::list_quotations),
            )
            .route(
                "/quotations/:id",
                get(quotations::get_quotation)
                    .patch(quotations::update_quotation)
                    .delete(quotations::delete_quotation),
            )
            .route("/quotations/:id/send", post(quotations::send_quotation))
            .route("/quotations/:id/accept", post(quotations::accept_quotation))
            .route("/quotations/:id/reject", post(quotations::reject_quotation))
            .route("/quotations/:id/expire", post(quotations::expire_quotation))
            .route("/quotations/:id/convert", post(quotations::convert_quotation))
            .route(
                "/quotations/:id/line-items",
                post(quotations::add_line_item),
            )
            .route(
                "/quotations/:id/line-items/:item_id",
                patch(quotations::update_line_item).delete(quotations::remove_line_item),
            )
            // Invoices
            .route(
                "/invoices",
                post(invoices::create_invoice).get(invoices::list_invoices),
            )
            .route(
                "/invoices/:id",
                get(invoices::get_invoice)
                    .patch(invoices::update_invoice)
                    .delete(invoices::delete_invoice),
            )
            .route("/invoices/:id/send", post(invoices::send_invoice))
            .route("/invoices/:id/view", post(invoices::mark_viewed))
            .route("/invoices/:id/cancel", post(invoices::cancel_invoice))
            .route(
                "/invoices/:id/payments",
                post(invoices::record_payment).get(invoices::list_payments),
            )
            .route("/invoices/:id/line-items", post(invoices::add_line_item))
            .route(
                "/invoices/:id/line-items/:item_id",
                patch(invoices::update_line_item).delete(invoices::remove_line_item),
            )
            // Credit notes
            .route(
                "/credit-notes",
                post(credit_notes::create_credit_note).get(credit_notes::list_credit_notes),
            )
            .route(
                "/credit-notes/:id",
                get(credit_notes::get_credit_note)
                    .patch(credit_notes::update_credit_note)
                    .delete(credit_notes::delete_credit_note),
            )
            .route("/credit-notes/:id/issue", post(credit_notes::issue_credit_note))
            .route("/credit-notes/:id/apply", post(credit_notes::apply_credit_note))
            .route("/credit-notes/:id/refund", post(credit_notes::refund_credit_note))
            .route("/credit-notes/:id/cancel", post(credit_notes::cancel_credit_note))
            .route(
                "/credit-notes/:id/line-items",
                post(credit_notes::add_line_item),
            )
            .route(
                "/credit-notes/:id/line-items/:item_id",
                patch(credit_notes::update_line_item).delete(credit_notes::remove_line_item),
            )
            // Recurring templates
            .route(
                "/recurring-templates",
                post(recurring::create_template).get(recurring::list_templates),
            )
            .route(
                "/recurring-templates/:id",
                get(recurring::get_template).patch(recurring::update_template),
            )
            .route(
                "/recurring-templates/:id/activate",
                post(recurring::activate_template),
            )
            .route(
                "/recurring-templates/:id/deactivate",
                post(recurring::deactivate_template),
            )
            // Settings
            .route(
                "/settings",
                get(settings::get_settings).put(settings::update_settings),
            )
            // Admin
            .route("/admin/outbox/failed", get(admin::list_failed_events))
            .merge(cron_routes)
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        workspace_id = tracing::field::Empty,
                    )
                }),
            )
            .layer(middleware::from_fn(metrics_middleware))
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(self.state);

        tracing::info!(
            service = "salesdocs-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, router).await
    }
}
