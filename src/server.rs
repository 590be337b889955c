use crate::app::{RegistrationOutcome, RegistrationUseCase, Rejection};
use crate::error::Result;
use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use hyper::Server;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Path of the registration route, shared with the scan client
pub const REGISTER_PATH: &str = "/api/registrar_code";

/// Scan fields as the scan client sends them in a JSON body
#[derive(Debug, Default, Clone, Serialize)]
pub struct ScanParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etapa: Option<String>,
}

/// Root probe
async fn root() -> &'static str {
    "API OK"
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "scan-intake",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus exposition, when a recorder is installed
async fn metrics_handler() -> Response {
    match crate::metrics::render() {
        Some(body) => body.into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

/// Registration handler (GET and POST). Query parameters win over body fields.
///
/// Each field is read on its own: a malformed query string or an odd body value
/// only loses that field, never the whole request.
async fn register_code(
    State(use_case): State<Arc<RegistrationUseCase>>,
    query: Option<Query<HashMap<String, String>>>,
    body: Option<Json<Value>>,
) -> Response {
    let query = query.map(|Query(params)| params).unwrap_or_default();
    let body = body.map(|Json(value)| value).unwrap_or(Value::Null);

    let code = first_present(query.get("code").cloned(), body_field(&body, "code")).unwrap_or_default();
    let stage = first_present(query.get("etapa").cloned(), body_field(&body, "etapa"));

    let outcome = use_case.register(&code, stage.as_deref()).await;
    outcome_response(outcome)
}

/// Empty values count as absent; whitespace-only values are kept and trimmed later
fn first_present(preferred: Option<String>, fallback: Option<String>) -> Option<String> {
    preferred.filter(|value| !value.is_empty()).or(fallback)
}

/// Text form of a scalar body field. Scanners sometimes send codes as JSON numbers.
fn body_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(text) => Some(text.clone()).filter(|text| !text.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Map a registration outcome to its status code and JSON payload
pub fn outcome_response(outcome: RegistrationOutcome) -> Response {
    match outcome {
        RegistrationOutcome::Created { barcode, stage } => (
            StatusCode::OK,
            Json(serde_json::json!({ "ok": true, "status": "OK", "code": barcode, "etapa": stage })),
        )
            .into_response(),
        RegistrationOutcome::AlreadyRegistered { barcode, stage } => (
            StatusCode::OK,
            Json(serde_json::json!({ "ok": true, "status": "YA_REGISTRADO", "code": barcode, "etapa": stage })),
        )
            .into_response(),
        RegistrationOutcome::Rejected(Rejection::UnknownCategory(code)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "ok": false, "error": "tipo no existe", "tipo": code })),
        )
            .into_response(),
        RegistrationOutcome::Rejected(Rejection::InvalidCode(message)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "ok": false, "error": message })),
        )
            .into_response(),
        RegistrationOutcome::StorageError { detail } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "ok": false, "error": detail })),
        )
            .into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(use_case: Arc<RegistrationUseCase>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route(REGISTER_PATH, get(register_code).post(register_code))
        .with_state(use_case)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}

/// Serve the router on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, use_case: Arc<RegistrationUseCase>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let app = create_server(use_case);
    Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start the HTTP server on the specified port, stopping on Ctrl-C
pub async fn start_server(use_case: Arc<RegistrationUseCase>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)?;

    info!("Server ready on port {}", port);
    info!("Registration: http://localhost:{port}{REGISTER_PATH}?code=<code>&etapa=<stage>");
    info!("Health check: http://localhost:{port}/health");

    serve(listener, use_case, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
