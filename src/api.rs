use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::config::ListenerConfig;
use crate::envelope::WireResponse;
use crate::error::{CommandError, ErrorFamily};
use crate::registry::{catalog, execute};
use crate::state::AppState;
use crate::supervisor::{Listener, ListenerError, ListenerFactory};

/// How long a stopping listener may take to drain in-flight requests.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ── Request types ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandRequest {
    command: String,
    #[serde(default)]
    parameters: Value,
}

// ── Envelope responses ───────────────────────────────────────────

/// HTTP status mirrors the error family. The body is always the envelope.
pub fn http_status(response: &WireResponse) -> StatusCode {
    match response.error().map(|e| e.code.family()) {
        None => StatusCode::OK,
        Some(ErrorFamily::InvalidParameter | ErrorFamily::InvalidRange | ErrorFamily::IndexOutOfBounds) => {
            StatusCode::BAD_REQUEST
        }
        Some(ErrorFamily::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorFamily::ExternalApi) => StatusCode::BAD_GATEWAY,
        Some(ErrorFamily::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn envelope(response: WireResponse) -> Response {
    (http_status(&response), Json(response)).into_response()
}

fn parse_body(operation: &str, body: &Bytes) -> Result<Value, CommandError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        CommandError::invalid_parameter(format!("Request body is not valid JSON: {e}"))
            .with_operation(operation)
    })
}

/// Run a command off the async runtime. Handlers call the studio synchronously.
async fn run_command(state: Arc<AppState>, name: String, params: Value) -> Response {
    let operation = name.clone();
    let response = tokio::task::spawn_blocking(move || execute::dispatch(&state, &name, &params))
        .await
        .unwrap_or_else(|e| {
            warn!(command = %operation, error = %e, "command task failed");
            WireResponse::failure(
                CommandError::internal(format!("Command task failed: {e}")).with_operation(operation),
            )
        });
    envelope(response)
}

// ── Handlers ─────────────────────────────────────────────────────

async fn post_command(Extension(state): Extension<Arc<AppState>>, body: Bytes) -> Response {
    let request = parse_body("command", &body).and_then(|value| {
        serde_json::from_value::<CommandRequest>(value).map_err(|e| {
            CommandError::invalid_parameter(format!(
                "Expected {{\"command\": string, \"parameters\": object}}: {e}"
            ))
            .with_operation("command")
        })
    });
    match request {
        Ok(request) => run_command(state, request.command, request.parameters).await,
        Err(e) => envelope(WireResponse::failure(e)),
    }
}

async fn post_tool(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    match parse_body(&name, &body) {
        Ok(params) => run_command(state, name, params).await,
        Err(e) => envelope(WireResponse::failure(e)),
    }
}

async fn get_tools(Extension(state): Extension<Arc<AppState>>) -> Response {
    envelope(WireResponse::success(catalog::to_json_schema(&state.registry)))
}

async fn get_health() -> Response {
    envelope(WireResponse::success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/command", post(post_command))
        .route("/api/tools/{name}", post(post_tool))
        .route("/api/tools", get(get_tools))
        .route("/api/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

// ── Listener ─────────────────────────────────────────────────────

/// Binds axum servers over one shared [`AppState`].
pub struct HttpListenerFactory {
    state: Arc<AppState>,
}

impl HttpListenerFactory {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

struct HttpListener {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
}

#[async_trait]
impl ListenerFactory for HttpListenerFactory {
    async fn bind(&self, config: &ListenerConfig) -> Result<Box<dyn Listener>, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            config: config.clone(),
            source,
        };
        let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(bind_error)?;
        let addr = listener.local_addr().map_err(bind_error)?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let app = router(Arc::clone(&self.state));
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });
        debug!(%addr, "HTTP server spawned");

        Ok(Box::new(HttpListener {
            addr,
            shutdown,
            server,
        }))
    }
}

#[async_trait]
impl Listener for HttpListener {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn shutdown(self: Box<Self>) -> Result<(), ListenerError> {
        let HttpListener {
            addr,
            shutdown,
            mut server,
        } = *self;
        // The server may already have exited; nothing to signal then.
        let _ = shutdown.send(());

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut server).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ListenerError::Serve(e.to_string())),
            Ok(Err(e)) => Err(ListenerError::Serve(e.to_string())),
            Err(_) => {
                server.abort();
                Err(ListenerError::Serve(format!(
                    "{addr} did not drain within {}s",
                    SHUTDOWN_TIMEOUT.as_secs()
                )))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_http_status_by_family() {
        let ok = WireResponse::success(json!({}));
        assert_eq!(http_status(&ok), StatusCode::OK);

        let cases = [
            (ErrorCode::MissingRequiredParameter, StatusCode::BAD_REQUEST),
            (ErrorCode::InvalidParameterIndex, StatusCode::BAD_REQUEST),
            (ErrorCode::IndexOutOfBounds, StatusCode::BAD_REQUEST),
            (ErrorCode::DeviceNotSelected, StatusCode::NOT_FOUND),
            (ErrorCode::ClipNotFound, StatusCode::NOT_FOUND),
            (ErrorCode::ExternalApiError, StatusCode::BAD_GATEWAY),
            (ErrorCode::InternalError, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            let response = WireResponse::failure(CommandError::new(code, "x"));
            assert_eq!(http_status(&response), status, "{code}");
        }
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body("t", &Bytes::from_static(b"")).unwrap(), Value::Null);
        assert_eq!(parse_body("t", &Bytes::from_static(b" \n")).unwrap(), Value::Null);
        assert_eq!(
            parse_body("t", &Bytes::from_static(b"{\"beats\": 4}")).unwrap(),
            json!({"beats": 4})
        );
        let err = parse_body("set_playback_position", &Bytes::from_static(b"{nope")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
        assert_eq!(err.operation, "set_playback_position");
    }
}
