use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};
use std::time::Instant;
use uuid::Uuid;

/// Collapse identifier path segments so route labels stay low-cardinality.
///
/// `/invoices/7f0b.../payments` becomes `/invoices/:id/payments`.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if Uuid::parse_str(segment).is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status().as_u16().to_string();

    let labels = [("method", method), ("path", path), ("status", status)];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::normalize_path;

    #[test]
    fn uuid_segments_are_collapsed() {
        let path = "/invoices/0c6aa1f2-9c23-47b8-8f52-1f1b2b3c4d5e/payments";
        assert_eq!(normalize_path(path), "/invoices/:id/payments");
    }

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/cron/outbox"), "/cron/outbox");
    }
}
