use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Extension, Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::errors::GovernorError;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use uuid::Uuid;

use crate::auth::middleware::{Claims, JwtSecret};
use crate::config::Config;
use crate::envelope::{ApiResponse, Meta};
use crate::error::ApiError;
use crate::gateway::proxy::ProxyRequest;
use crate::realtime::handler as ws_handler;
use crate::state::AppState;

/// Server-assigned request id, generated by the logging middleware and
/// echoed in response envelope meta.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Inject the JWT secret into request extensions so the Claims extractor
/// can find it.
async fn inject_jwt_secret(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Structured request logging: assign a request id, time the request,
/// log one line per request with method, path, status, and latency.
async fn request_logger(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        request_id = %request_id,
        "Request handled"
    );

    response
}

/// Response-header hardening applied to every response.
async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("SAMEORIGIN"));
    headers.insert("x-xss-protection", HeaderValue::from_static("0"));
    headers.insert("x-dns-prefetch-control", HeaderValue::from_static("off"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    response
}

/// Render rate-limit rejections as the standard envelope, keeping the
/// x-ratelimit-* headers the limiter computed.
fn rate_limit_response(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { headers, .. } => {
            let mut response = ApiError::RateLimited.into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => ApiError::Internal.into_response(),
        GovernorError::Other { .. } => ApiError::Internal.into_response(),
    }
}

/// Convert handler panics into a structured error response instead of
/// leaking a stack trace to the client.
fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("Handler panicked");
    ApiError::Internal.into_response()
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState, config: &Config) -> Router {
    // Rate limiting on /api: the configured request budget per client IP
    // per window. Uses PeerIpKeyExtractor, which reads from
    // ConnectInfo<SocketAddr>.
    let max_requests = config.rate_limit_max_requests.max(1);
    let replenish_ms =
        (config.rate_limit_window_secs.max(1) * 1000 / u64::from(max_requests)).max(1);
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .period(Duration::from_millis(replenish_ms))
            .burst_size(max_requests)
            .use_headers()
            .error_handler(rate_limit_response)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    // /api surface: health, index, and the backing-service mounts.
    // Only /api/auth is reachable without a credential.
    let mut api_routes = Router::new()
        .route("/api", get(api_index))
        .route("/api/health", get(api_health));

    for route in state.services.routes() {
        let root = format!("/api/{}", route.prefix);
        let rest = format!("/api/{}/{{*rest}}", route.prefix);
        if route.requires_auth {
            api_routes = api_routes
                .route(&root, any(proxy_protected))
                .route(&rest, any(proxy_protected));
        } else {
            api_routes = api_routes
                .route(&root, any(proxy_public))
                .route(&rest, any(proxy_public));
        }
    }

    let api_routes = api_routes.layer(GovernorLayer {
        config: governor_config,
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_url
                .parse::<HeaderValue>()
                .expect("Invalid frontend origin"),
        )
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Layer order (outermost first): panic catching, security headers,
    // CORS, compression/decompression, body size bound, request logging,
    // JWT secret injection, then routing.
    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .route("/ws", get(ws_handler::ws_upgrade))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .layer(middleware::from_fn(request_logger))
        .layer(DefaultBodyLimit::max(config.max_body_bytes()))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(middleware::from_fn(security_headers))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// GET /health — liveness probe, no envelope.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/health — gateway health plus a per-backing-service map.
async fn api_health(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let services = state.services.service_health().await;
    Json(ApiResponse::ok(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "services": services,
    })))
}

/// GET /api — API name, version, and mounted path prefixes.
async fn api_index(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    Json(ApiResponse::ok(json!({
        "name": "TaskCore API Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": state.services.mounted_prefixes(),
    })))
}

/// Forward a request on an unauthenticated mount (/api/auth).
async fn proxy_public(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    method: Method,
    uri: Uri,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    forward(&state, request_id, method, &uri, query, body).await
}

/// Forward a request on a credential-gated mount. The Claims extractor
/// resolves verification failures here with distinct codes; the backing
/// service never sees an unauthenticated request.
async fn proxy_protected(
    State(state): State<AppState>,
    _claims: Claims,
    Extension(request_id): Extension<RequestId>,
    method: Method,
    uri: Uri,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    forward(&state, request_id, method, &uri, query, body).await
}

async fn forward(
    state: &AppState,
    request_id: RequestId,
    method: Method,
    uri: &Uri,
    query: BTreeMap<String, String>,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let path = uri.path();
    let prefix = path
        .strip_prefix("/api/")
        .and_then(|p| p.split('/').next())
        .ok_or(ApiError::NotFound)?;
    let route = state.services.find_route(prefix).ok_or(ApiError::NotFound)?;

    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|_| ApiError::BadRequest("Malformed JSON body"))?
    };

    let response = route
        .service
        .dispatch(ProxyRequest {
            method: method.to_string(),
            path: path.to_string(),
            query,
            body,
        })
        .await;

    Ok(Json(ApiResponse::ok_with_meta(
        response.data,
        Meta::new(request_id.0),
    )))
}

/// Fallback for any unmatched path.
async fn not_found() -> (StatusCode, Json<ApiResponse<Value>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure("NOT_FOUND", "Route not found")),
    )
}
