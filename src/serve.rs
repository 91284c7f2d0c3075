//! Purpose: Provide the HTTP conversion server for ediwire.
//! Exports: `ServeConfig`, `serve`, `API_KEY_HEADER`.
//! Role: Axum-based server exposing X12-to-JSON conversion over POST.
//! Invariants: The parser runs only after the API-key gate passes.
//! Invariants: Loopback-only unless explicitly allowed; non-loopback binds require a key.
//! Notes: Conversion is total; request bodies are decoded lossily as text.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ediwire::api::{Error, ErrorKind, parse};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub api_key: Option<String>,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
}

#[derive(Clone)]
struct AppState {
    api_key: Option<String>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let state = Arc::new(AppState {
        api_key: config.api_key,
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/convert", post(convert))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;

    tracing::info!(
        bind = %config.bind,
        auth = state.api_key.is_some(),
        "ediwire listening"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) {
        if !config.allow_non_loopback {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("non-loopback bind requires explicit opt-in")
                .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
        }
        if config.api_key.is_none() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("non-loopback bind requires an API key")
                .with_hint("Pass --api-key-file or set API_SECRET."));
        }
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), Error> {
    let Some(expected) = state.api_key.as_ref() else {
        return Ok(());
    };
    let Some(value) = headers.get(API_KEY_HEADER) else {
        return Err(Error::new(ErrorKind::Permission).with_message("missing API key"));
    };
    if value.to_str().unwrap_or_default() != expected {
        return Err(Error::new(ErrorKind::Permission).with_message("invalid API key"));
    }
    Ok(())
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn convert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }
    let content = String::from_utf8_lossy(&body);
    Json(parse(&content)).into_response()
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::Permission => StatusCode::UNAUTHORIZED,
        ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
        },
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::{
        API_KEY_HEADER, AppState, ErrorKind, ServeConfig, authorize, serve, validate_config,
    };
    use axum::http::{HeaderMap, HeaderValue};

    fn loopback_config() -> ServeConfig {
        ServeConfig {
            bind: "127.0.0.1:0".parse().expect("bind"),
            api_key: None,
            allow_non_loopback: false,
            max_body_bytes: 1024 * 1024,
        }
    }

    #[tokio::test]
    async fn serve_rejects_non_loopback_bind() {
        let config = ServeConfig {
            bind: "0.0.0.0:0".parse().expect("bind"),
            ..loopback_config()
        };
        let err = serve(config).await.expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn non_loopback_requires_allow_flag() {
        let config = ServeConfig {
            bind: "0.0.0.0:0".parse().expect("bind"),
            api_key: Some("dev".to_string()),
            ..loopback_config()
        };
        let err = validate_config(&config).expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn non_loopback_requires_api_key() {
        let config = ServeConfig {
            bind: "0.0.0.0:0".parse().expect("bind"),
            allow_non_loopback: true,
            ..loopback_config()
        };
        let err = validate_config(&config).expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn non_loopback_with_key_and_opt_in_is_accepted() {
        let config = ServeConfig {
            bind: "0.0.0.0:0".parse().expect("bind"),
            api_key: Some("dev".to_string()),
            allow_non_loopback: true,
            ..loopback_config()
        };
        validate_config(&config).expect("config ok");
    }

    #[test]
    fn loopback_without_key_is_accepted() {
        validate_config(&loopback_config()).expect("config ok");
    }

    #[test]
    fn body_limit_must_be_positive() {
        let config = ServeConfig {
            max_body_bytes: 0,
            ..loopback_config()
        };
        let err = validate_config(&config).expect_err("expected usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn authorize_passes_without_configured_key() {
        let state = AppState { api_key: None };
        authorize(&HeaderMap::new(), &state).expect("open access");
    }

    #[test]
    fn authorize_rejects_missing_and_wrong_keys() {
        let state = AppState {
            api_key: Some("sekrit".to_string()),
        };

        let err = authorize(&HeaderMap::new(), &state).expect_err("missing key");
        assert_eq!(err.kind(), ErrorKind::Permission);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        let err = authorize(&headers, &state).expect_err("wrong key");
        assert_eq!(err.kind(), ErrorKind::Permission);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("sekrit"));
        authorize(&headers, &state).expect("matching key");
    }
}
