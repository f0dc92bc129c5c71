//! Inbound webhook server.
//!
//! Exposes `/c/{channel_type}/{channel_uuid}/{action}` for every registered
//! handler, resolves the channel and hands the raw body to the handler.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::Router;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::{ChannelConfig, ServerConfig};
use crate::error::ChannelHandlerError;
use crate::logging::ChannelLogger;
use crate::registry::HandlerRegistry;
use crate::response::{ResponseData, WebhookResponse};
use crate::types::{ChannelLog, ChannelType};

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct ServerState {
    registry: Arc<HandlerRegistry>,
    logger: Arc<ChannelLogger>,
}

impl ServerState {
    pub fn new(registry: Arc<HandlerRegistry>, logger: Arc<ChannelLogger>) -> Self {
        Self { registry, logger }
    }
}

/// Build the webhook router.
pub fn router(state: ServerState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(
            "/c/:channel_type/:channel_uuid/:action",
            any(handle_channel_request),
        )
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    config: &ServerConfig,
    state: ServerState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ChannelHandlerError> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ChannelHandlerError::Internal(format!("bind to {} failed: {}", addr, e)))?;

    tracing::info!(addr = %addr, "webhook server listening");

    axum::serve(listener, router(state, config.max_body_bytes))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ChannelHandlerError::Internal(format!("server error: {}", e)))
}

async fn handle_channel_request(
    State(state): State<ServerState>,
    method: Method,
    uri: Uri,
    Path((channel_type, channel_uuid, action)): Path<(String, String, String)>,
    body: Bytes,
) -> WebhookResponse {
    let start = Instant::now();
    let channel_type = ChannelType::new(&channel_type);

    let Some(handler) = state.registry.handler(&channel_type) else {
        return WebhookResponse::not_found(&ChannelHandlerError::UnknownRoute(
            uri.path().to_string(),
        ));
    };
    if !handler.routes().iter().any(|r| r.matches(&method, &action)) {
        return WebhookResponse::not_found(&ChannelHandlerError::UnknownRoute(format!(
            "{} {}",
            method,
            uri.path()
        )));
    }

    let channel = match resolve_channel(&state, &channel_type, &channel_uuid).await {
        Ok(channel) => channel,
        Err(e) => return WebhookResponse::from_error(Vec::new(), &e),
    };

    let outcome = handler.handle_request(&action, &channel, body.clone()).await;

    tracing::info!(
        channel_uuid = %channel.uuid,
        action = %action,
        status = outcome.response.status.as_u16(),
        events = outcome.events.len(),
        "webhook handled"
    );

    let log = request_log(&channel, &method, &uri, &body, &outcome.response, start);
    state.logger.log(&log).await;

    outcome.response
}

async fn resolve_channel(
    state: &ServerState,
    channel_type: &ChannelType,
    channel_uuid: &str,
) -> Result<ChannelConfig, ChannelHandlerError> {
    let uuid = Uuid::parse_str(channel_uuid)
        .map_err(|_| ChannelHandlerError::ChannelNotFound(channel_uuid.to_string()))?;

    state
        .registry
        .backend()
        .get_channel(channel_type, uuid)
        .await?
        .ok_or_else(|| ChannelHandlerError::ChannelNotFound(uuid.to_string()))
}

fn request_log(
    channel: &ChannelConfig,
    method: &Method,
    uri: &Uri,
    body: &Bytes,
    response: &WebhookResponse,
    start: Instant,
) -> ChannelLog {
    let error = response.body.data.iter().find_map(|d| match d {
        ResponseData::Error { error } => Some(error.clone()),
        _ => None,
    });

    let mut log =
        ChannelLog::new(response.body.message.clone(), channel.uuid, None).with_error(error);
    log.method = method.to_string();
    log.url = uri.to_string();
    log.status_code = Some(response.status.as_u16());
    log.request = String::from_utf8_lossy(body).into_owned();
    log.response = serde_json::to_string(&response.body).unwrap_or_default();
    log.elapsed_ms = start.elapsed().as_millis() as u64;
    log
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::handlers::websocket::WebSocketHandler;
    use crate::traits::Backend;
    use crate::urn::UrnScheme;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn app() -> (Router, ChannelConfig, Arc<ChannelLogger>) {
        let channel = ChannelConfig {
            uuid: Uuid::new_v4(),
            channel_type: ChannelType::new("WS"),
            name: "bridge".to_string(),
            address: "http://127.0.0.1:9/send".to_string(),
            schemes: vec![UrnScheme::Ext],
        };
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::with_channels([channel.clone()]));
        let logger = Arc::new(ChannelLogger::new(None));
        let mut registry = HandlerRegistry::new(backend.clone());
        registry
            .register(Arc::new(WebSocketHandler::new(
                backend,
                logger.clone(),
                reqwest::Client::new(),
            )))
            .unwrap();
        let state = ServerState::new(Arc::new(registry), logger.clone());
        (router(state, 65536), channel, logger)
    }

    fn post(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _, _) = app().await;
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_channel_type_is_not_found() {
        let (app, channel, _) = app().await;
        let uri = format!("/c/tg/{}/receive", channel.uuid);
        let resp = app.oneshot(post(&uri, "{}")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_is_not_found() {
        let (app, channel, _) = app().await;
        let uri = format!("/c/ws/{}/receive", channel.uuid);
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_channel_is_bad_request() {
        let (app, _, _) = app().await;
        let uri = format!("/c/ws/{}/receive", Uuid::new_v4());
        let resp = app.oneshot(post(&uri, "{}")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let (app, _, _) = self::app().await;
        let resp = app.oneshot(post("/c/ws/not-a-uuid/receive", "{}")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn handled_requests_are_logged() {
        let (app, channel, logger) = app().await;
        let uri = format!("/c/ws/{}/receive", channel.uuid);
        let resp = app.oneshot(post(&uri, r#"{"instanceId": ""}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Ignored");
        assert_eq!(body["data"][0]["info"], "Ignoring request, no message");
        assert_eq!(logger.log_count().await, 1);
    }
}
