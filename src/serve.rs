//! Purpose: HTTP/JSON preset service for slicekit.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum server exposing preset enumeration and resolution so
//! non-embedding clients can inspect a preset directory remotely.
//! Invariants: Every request resolves against a fresh store; the server
//! never holds slicing sessions.
//! Invariants: Error kinds map to HTTP status codes and are echoed in the
//! JSON error envelope.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slicekit::api::{
    ConfigMap, ConfigValue, DirStore, Error, ErrorKind, PresetCategory, PresetRequest,
    PresetStore, Selection,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub preset_dirs: Vec<PathBuf>,
}

struct AppState {
    preset_dirs: Vec<PathBuf>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    init_tracing();

    let state = Arc::new(AppState {
        preset_dirs: config.preset_dirs,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/v0/presets", get(list_presets))
        .route("/v0/resolve", post(resolve_presets))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    let local_addr = listener.local_addr().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read bound address")
            .with_source(err)
    })?;
    info!(addr = %local_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("server error")
                .with_source(err)
        })
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

async fn health() -> Response {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

async fn list_presets(State(state): State<Arc<AppState>>) -> Response {
    let store = match open_store(&state) {
        Ok(store) => store,
        Err(err) => return error_response(err),
    };
    let mut categories = BTreeMap::new();
    for category in PresetCategory::ALL {
        let names = match store.names(category) {
            Ok(names) => names,
            Err(err) => return error_response(err),
        };
        categories.insert(category.as_str(), names);
    }
    Json(json!({ "presets": categories })).into_response()
}

#[derive(Debug, Deserialize)]
struct ResolveBody {
    #[serde(default)]
    printer: Option<String>,
    #[serde(default)]
    filament: Option<String>,
    #[serde(default)]
    process: Option<String>,
    #[serde(default)]
    overrides: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ResolveReply {
    presets: Selection,
    config: serde_json::Value,
}

async fn resolve_presets(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveBody>,
) -> Response {
    let mut store = match open_store(&state) {
        Ok(store) => store,
        Err(err) => return error_response(err),
    };
    let request = PresetRequest {
        printer: body.printer,
        filament: body.filament,
        process: body.process,
    };
    let mut selection = Selection::default();
    let mut config = ConfigMap::new();
    if let Err(err) = slicekit::api::resolve_presets(&mut store, &request, &mut selection, &mut config)
    {
        return error_response(err);
    }
    for (key, value) in &body.overrides {
        config.set(key.clone(), ConfigValue::single(value.clone()));
    }
    Json(ResolveReply {
        presets: selection,
        config: config.to_json_value(),
    })
    .into_response()
}

fn open_store(state: &AppState) -> Result<DirStore, Error> {
    let mut store = DirStore::with_roots(state.preset_dirs.clone());
    store.initialize()?;
    Ok(store)
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage | ErrorKind::ConfigParse => StatusCode::BAD_REQUEST,
        ErrorKind::PresetNotFound => StatusCode::NOT_FOUND,
        ErrorKind::NoModel | ErrorKind::NoConfig => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.message().unwrap_or("error"),
            "preset": err.preset(),
            "path": err.path().map(|path| path.to_string_lossy().to_string()),
        }
    });
    (status, Json(body)).into_response()
}
