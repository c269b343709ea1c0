//! HTTP transport for the correction pipeline.
//!
//! Axum router exposing the fix/analyze operations plus plain-JSON health,
//! info, and metrics endpoints. CORS is wide open: the service is a local
//! companion API for a browser frontend.

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::{cmp::Ordering, sync::Arc};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::CorrectionPipeline;

/// Shared state for the HTTP server
#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<Config>,
    pub pipeline: Arc<CorrectionPipeline>,
    pub metrics: Arc<Mutex<HttpMetrics>>,
}

/// Metrics for the HTTP server
#[derive(Debug, Clone)]
pub struct HttpMetrics {
    pub total_requests: u64,
    pub last_request_unix: u64,
    pub errors_total: u64,
    pub latencies: Vec<f64>, // ring buffer for p95
}

impl HttpMetrics {
    fn new() -> Self {
        Self {
            total_requests: 0,
            last_request_unix: std::time::SystemTime::UNIX_EPOCH
                .elapsed()
                .unwrap_or_default()
                .as_secs(),
            errors_total: 0,
            latencies: Vec::with_capacity(256),
        }
    }
}

/// Request body shared by fix and analyze; `issue` is forwarded untouched
#[derive(Debug, Deserialize)]
pub struct FixRequest {
    pub code: String,
    #[serde(default)]
    pub issue: Option<serde_json::Value>,
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    "ok"
}

/// Info endpoint
pub async fn info_handler(State(state): State<HttpState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json!({
            "model": {
                "name": state.config.system.model_name,
                "dir": state.config.system.model_dir,
                "loaded": state.pipeline.model_available()
            },
            "server": {
                "bind": state.config.runtime.http_bind.to_string(),
                "version": env!("CARGO_PKG_VERSION")
            }
        })
        .to_string(),
    )
}

/// Metrics endpoint
pub async fn metrics_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let metrics = state.metrics.lock().await.clone();

    let (avg_latency_ms, p95_latency_ms) = if metrics.latencies.is_empty() {
        (None, None)
    } else {
        let sum: f64 = metrics.latencies.iter().sum();
        let avg = sum / metrics.latencies.len() as f64;
        let mut sorted = metrics.latencies.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let p95_idx = (sorted.len() as f64 * 0.95) as usize;
        let p95 = sorted.get(p95_idx).copied();
        (Some(avg), p95)
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json!({
            "metrics_version": "1",
            "total_requests": metrics.total_requests,
            "last_request_unix": metrics.last_request_unix,
            "errors_total": metrics.errors_total,
            "avg_latency_ms": avg_latency_ms,
            "p95_latency_ms": p95_latency_ms
        })
        .to_string(),
    )
}

/// POST /api/fix
pub async fn fix_handler(
    State(state): State<HttpState>,
    Json(req): Json<FixRequest>,
) -> impl IntoResponse {
    if !state.pipeline.model_available() {
        // Operational flag rather than a silent heuristics-only no-op
        return Json(json!({ "error": "generative model not loaded" }));
    }
    let fixed = state.pipeline.fix(&req.code, req.issue.as_ref()).await;
    Json(json!({ "fixedCode": fixed }))
}

/// POST /api/analyze
pub async fn analyze_handler(
    State(state): State<HttpState>,
    Json(req): Json<FixRequest>,
) -> impl IntoResponse {
    let issues = state.pipeline.analyze(&req.code, req.issue.as_ref()).await;
    Json(json!({ "issues": issues }))
}

/// Start the HTTP server
pub async fn start_http_server(config: Arc<Config>, pipeline: Arc<CorrectionPipeline>) -> Result<()> {
    let state = HttpState {
        config: config.clone(),
        pipeline,
        metrics: Arc::new(Mutex::new(HttpMetrics::new())),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/fix", post(fix_handler))
        .route("/api/analyze", post(analyze_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            |State(metrics): State<Arc<Mutex<HttpMetrics>>>,
             req: axum::http::Request<Body>,
             next: axum::middleware::Next| async move {
                let is_api = req.uri().path().starts_with("/api/");
                let start = if is_api {
                    Some(std::time::Instant::now())
                } else {
                    None
                };
                let resp = next.run(req).await;
                if let Some(start_time) = start {
                    let latency_ms = start_time.elapsed().as_millis() as f64;
                    let mut m = metrics.lock().await;
                    if latency_ms > 0.0 {
                        m.latencies.push(latency_ms);
                        if m.latencies.len() > 256 {
                            m.latencies.remove(0);
                        }
                    }
                    if !resp.status().is_success() {
                        m.errors_total = m.errors_total.saturating_add(1);
                    }
                    m.total_requests = m.total_requests.saturating_add(1);
                    m.last_request_unix = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_secs();
                }
                resp
            },
        ))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.runtime.http_bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP listener: {}", e))?;

    tracing::info!("Starting HTTP server on {}", config.runtime.http_bind);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::GenerativeAdapter;
    use crate::gate::QualityGate;
    use crate::generator::Generator;
    use crate::heuristics::HeuristicEngine;
    use async_trait::async_trait;
    use axum::response::Response;

    /// Always answers with the same canned output
    struct Canned(String);

    #[async_trait]
    impl Generator for Canned {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    fn state_with(generator: Option<Arc<dyn Generator>>) -> HttpState {
        let config = Config::default();
        let adapter = GenerativeAdapter::new(generator, config.pipeline.prompt_prefix.clone());
        let gate = QualityGate::new(
            config.pipeline.ratio_min,
            config.pipeline.ratio_max,
            &config.pipeline.bad_patterns,
        )
        .unwrap();
        HttpState {
            config: Arc::new(config),
            pipeline: Arc::new(CorrectionPipeline::new(adapter, gate, HeuristicEngine::new())),
            metrics: Arc::new(Mutex::new(HttpMetrics::new())),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn fix_without_model_reports_operational_flag() {
        let state = state_with(None);
        let request = FixRequest {
            code: "<button role=\"button\">Go</button>".to_string(),
            issue: None,
        };

        let response = fix_handler(State(state), Json(request)).await.into_response();
        // the flag travels as a normal 200 payload, not a transport error
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "error": "generative model not loaded" }));
    }

    #[tokio::test]
    async fn fix_with_model_returns_fixed_code() {
        let state = state_with(Some(Arc::new(Canned(
            "<img src=\"cat.jpg\" alt=\"A cat\">".to_string(),
        ))));
        let request = FixRequest {
            code: "<img src=\"cat.jpg\">".to_string(),
            issue: None,
        };

        let response = fix_handler(State(state), Json(request)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["fixedCode"], "<img src=\"cat.jpg\" alt=\"A cat\">");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn analyze_without_model_returns_empty_issue_list() {
        let state = state_with(None);
        let request = FixRequest {
            code: "<div class=\"header\"><div class=\"content\">Hi</div></div>".to_string(),
            issue: None,
        };

        let response = analyze_handler(State(state), Json(request))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "issues": [] }));
    }

    #[tokio::test]
    async fn analyze_issue_shape_is_camel_case() {
        // A too-long candidate trips the gate; heuristics then carry the
        // structural suggestion into the issue record.
        let state = state_with(Some(Arc::new(Canned(
            "<p>hallucinated</p>".repeat(40),
        ))));
        let request = FixRequest {
            code: "<div class=\"header\"><div class=\"content\">Hi</div></div>".to_string(),
            issue: None,
        };

        let response = analyze_handler(State(state), Json(request))
            .await
            .into_response();
        let body = body_json(response).await;
        let issues = body["issues"].as_array().unwrap();
        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue["ruleId"], "ai-generative-improvement");
        assert_eq!(issue["type"], "warning");
        assert!(issue["fix"]["fixedCode"].as_str().unwrap().contains("skip-link"));
        assert!(issue["id"].as_str().unwrap().starts_with("ai-fix-"));
    }
}
