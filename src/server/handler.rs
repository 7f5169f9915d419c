// src/server/handler.rs
use crate::health::{
    ApiResponse, HealthPoller, HealthReporter, HealthStatus, ServiceHealth, ServiceStatus,
};
use crate::metrics::MetricsRegistry;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tower::Service;
use tracing::error;

/// Routes the health API: `/api/health`, `/api/health/<source>`, CORS
/// preflight, and the metrics endpoint.
#[derive(Clone)]
pub struct RequestHandler {
    poller: Arc<HealthPoller>,
    reporter: Arc<HealthReporter>,
    metrics: Arc<MetricsRegistry>,
    metrics_path: String,
}

impl RequestHandler {
    pub fn new(
        poller: Arc<HealthPoller>,
        reporter: Arc<HealthReporter>,
        metrics: Arc<MetricsRegistry>,
        metrics_path: String,
    ) -> Self {
        Self {
            poller,
            reporter,
            metrics,
            metrics_path,
        }
    }

    fn route(&self, req: &Request<Body>) -> Response<Body> {
        let path = req.uri().path();

        match (req.method(), path) {
            (&Method::OPTIONS, p) if p == "/api/health" || p.starts_with("/api/health/") => {
                cors_preflight()
            }
            (&Method::GET, "/api/health") => self.overall_health(),
            (&Method::POST, "/api/health/refresh") => self.refresh(),
            (&Method::GET, p) if p.starts_with("/api/health/") => {
                self.source_health(p.trim_start_matches("/api/health/"))
            }
            (&Method::GET, p) if p == self.metrics_path => self.metrics_text(),
            _ => json_response(StatusCode::NOT_FOUND, &ApiResponse::<()>::fail("Not Found")),
        }
    }

    /// `{ success: true, data: HealthStatus }`; 200 for healthy/degraded,
    /// 503 for unhealthy. A failure inside the health check itself reports
    /// an unhealthy document instead of an opaque 500.
    fn overall_health(&self) -> Response<Body> {
        let snapshot = self.poller.snapshot();
        let health = self.reporter.build(&snapshot);

        let status = match health.status {
            ServiceStatus::Healthy | ServiceStatus::Degraded => StatusCode::OK,
            ServiceStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        match serde_json::to_string(&ApiResponse::ok(health)) {
            Ok(body) => json_body(status, body),
            Err(e) => {
                error!(error = %e, "failed to serialize health document");
                health_check_failure()
            }
        }
    }

    /// Wake the poller for an immediate cycle. The refresh runs
    /// asynchronously; callers observe the result through `/api/health`.
    fn refresh(&self) -> Response<Body> {
        self.poller.trigger_refresh();
        json_response(
            StatusCode::ACCEPTED,
            &ApiResponse::<()> {
                success: true,
                data: None,
                message: Some("Refresh scheduled".to_string()),
                error: None,
            },
        )
    }

    /// Latest report for one named source; unknown names are 404.
    fn source_health(&self, name: &str) -> Response<Body> {
        let snapshot = self.poller.snapshot();

        match snapshot.source(name) {
            Some(report) => {
                let entry = ServiceHealth {
                    name: report.name.clone(),
                    status: report.health.status,
                    response_time_ms: Some(report.response_time_ms),
                    message: report.error.clone(),
                };
                let status = match entry.status {
                    ServiceStatus::Healthy | ServiceStatus::Degraded => StatusCode::OK,
                    ServiceStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
                };
                match serde_json::to_string(&ApiResponse::ok(entry)) {
                    Ok(body) => json_body(status, body),
                    Err(e) => {
                        error!(error = %e, "failed to serialize source health");
                        health_check_failure()
                    }
                }
            }
            None => json_response(
                StatusCode::NOT_FOUND,
                &ApiResponse::<()>::fail(format!("Unknown health source: {}", name)),
            ),
        }
    }

    fn metrics_text(&self) -> Response<Body> {
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(self.metrics.gather()))
            .unwrap_or_else(|_| Response::new(Body::empty()))
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.route(&req)) })
    }
}

fn cors_preflight() -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS")
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")
        .body(Body::empty())
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response<Body> {
    match serde_json::to_string(payload) {
        Ok(body) => json_body(status, body),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            internal_error()
        }
    }
}

/// Generic 500 envelope for non-health routes; the health paths use
/// [`health_check_failure`] instead.
fn internal_error() -> Response<Body> {
    json_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"success":false,"error":"Internal server error"}"#.to_string(),
    )
}

fn json_body(status: StatusCode, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

/// 503 envelope for failures inside the health check itself.
fn health_check_failure() -> Response<Body> {
    let payload = ApiResponse::fail_with_data(
        HealthStatus::unhealthy("Health Check", "Internal error building health document"),
        "Health check failed",
    );
    let body = serde_json::to_string(&payload)
        .unwrap_or_else(|_| r#"{"success":false,"error":"Health check failed"}"#.to_string());
    json_body(StatusCode::SERVICE_UNAVAILABLE, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, AppConfig, Config, HealthConfig, ServerConfig};
    use crate::health::HealthSource;

    fn test_handler(sources: Vec<Arc<dyn HealthSource>>) -> RequestHandler {
        let config = Config {
            server: ServerConfig::default(),
            api: ApiConfig {
                base_url: "http://localhost:3001/api".parse().unwrap(),
                timeout_ms: 10_000,
                retries: 0,
                retry_delay_ms: 1_000,
                retry_max_delay_ms: 30_000,
            },
            health: HealthConfig::default(),
            app: AppConfig::default(),
        };
        let poller = Arc::new(HealthPoller::new(
            sources,
            std::time::Duration::from_secs(30),
            None,
        ));
        RequestHandler::new(
            poller,
            Arc::new(HealthReporter::new(&config)),
            Arc::new(MetricsRegistry::new().unwrap()),
            "/metrics".to_string(),
        )
    }

    #[tokio::test]
    async fn get_health_returns_envelope() {
        let handler = test_handler(vec![]);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();

        let res = handler.route(&req);
        assert_eq!(res.status(), StatusCode::OK);

        let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["data"]["status"], "healthy");
        assert!(parsed["data"]["services"].as_array().unwrap().len() >= 2);
    }

    #[tokio::test]
    async fn options_health_sets_cors_headers() {
        let handler = test_handler(vec![]);
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();

        let res = handler.route(&req);
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(res.headers()[ACCESS_CONTROL_ALLOW_METHODS], "GET, OPTIONS");
    }

    #[tokio::test]
    async fn unknown_source_is_404() {
        let handler = test_handler(vec![]);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/api/health/nope")
            .body(Body::empty())
            .unwrap();

        let res = handler.route(&req);
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_is_404_json() {
        let handler = test_handler(vec![]);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/api/other")
            .body(Body::empty())
            .unwrap();

        let res = handler.route(&req);
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn post_refresh_is_accepted() {
        let handler = test_handler(vec![]);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/health/refresh")
            .body(Body::empty())
            .unwrap();

        let res = handler.route(&req);
        assert_eq!(res.status(), StatusCode::ACCEPTED);

        let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["message"], "Refresh scheduled");
    }

    #[tokio::test]
    async fn internal_error_envelope_is_generic() {
        let res = internal_error();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["error"], "Internal server error");
        assert!(parsed.get("data").is_none());
    }

    #[tokio::test]
    async fn health_check_failure_envelope_carries_unhealthy_document() {
        let res = health_check_failure();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = hyper::body::to_bytes(res.into_body()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["error"], "Health check failed");
        assert_eq!(parsed["data"]["status"], "unhealthy");
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_text() {
        let handler = test_handler(vec![]);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let res = handler.route(&req);
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }
}
