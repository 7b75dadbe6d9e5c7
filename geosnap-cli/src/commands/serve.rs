//! `geosnap serve` - the HTTP dispatch layer.
//!
//! Two routes: `POST /gee/run` triggers a full pipeline run for a place
//! name, and `GET /gee/file/:name` serves the resulting artifacts out of
//! the downloads directory. Responses to `run` carry the manifest with
//! every file reference rewritten to a fetchable `/gee/file/` URL.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use geosnap::pipeline::ExportPipeline;

use super::{build_pipeline, EndpointArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to listen on; overrides the config file.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    #[command(flatten)]
    pub endpoints: EndpointArgs,
}

struct AppState {
    pipeline: ExportPipeline,
    downloads_dir: PathBuf,
    manifest_path: PathBuf,
}

pub fn run(args: ServeArgs) -> Result<(), CliError> {
    let settings = args.endpoints.resolve()?;
    let port = args.port.unwrap_or(settings.server_port);
    let pipeline = build_pipeline(&settings)?;

    let downloads_dir = pipeline.config().downloads_dir.clone();
    let state = Arc::new(AppState {
        manifest_path: downloads_dir.join("output.json"),
        downloads_dir,
        pipeline,
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Server(format!("failed to start runtime: {}", e)))?;

    runtime.block_on(async move {
        let app = Router::new()
            .route("/gee/run", post(run_job))
            .route("/gee/file/:name", get(serve_file))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::Server(format!("failed to bind {}: {}", addr, e)))?;
        info!(%addr, "dispatch server listening");
        println!("Listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| CliError::Server(e.to_string()))
    })
}

#[derive(Deserialize)]
struct RunRequest {
    location: Option<String>,
}

async fn run_job(State(state): State<Arc<AppState>>, Json(req): Json<RunRequest>) -> Response {
    let location = match req.location {
        Some(l) if !l.trim().is_empty() => l.trim().to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "location field required" })),
            )
                .into_response();
        }
    };

    info!(location = %location, "dispatching export run");
    let worker = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        worker
            .pipeline
            .run(&location, &worker.manifest_path)
            .map(|manifest| serde_json::to_value(&manifest))
    })
    .await;

    match result {
        Ok(Ok(Ok(manifest))) => Json(with_file_urls(manifest)).into_response(),
        Ok(Ok(Err(e))) => {
            error!(error = %e, "manifest serialization failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "export failed", "detail": e.to_string() })),
            )
                .into_response()
        }
        Ok(Err(e)) => pipeline_error_response(&e),
        Err(e) => {
            error!(error = %e, "pipeline task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "export failed", "detail": "internal task failure" })),
            )
                .into_response()
        }
    }
}

fn pipeline_error_response(err: &geosnap::PipelineError) -> Response {
    if err.is_input_error() {
        warn!(error = %err, "rejected export request");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response()
    } else {
        error!(error = %err, "export run failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "export failed", "detail": err.to_string() })),
        )
            .into_response()
    }
}

/// Rewrite the manifest's file names into download URLs: add `tif_url`
/// and replace each `png` entry with its `/gee/file/` path.
fn with_file_urls(mut manifest: Value) -> Value {
    if let Some(obj) = manifest.as_object_mut() {
        if let Some(tif) = obj.get("tif").and_then(Value::as_str) {
            let url = file_url(tif);
            obj.insert("tif_url".to_string(), Value::String(url));
        }
        if let Some(png) = obj.get_mut("png").and_then(Value::as_object_mut) {
            for (_, value) in png.iter_mut() {
                if let Some(name) = value.as_str() {
                    *value = Value::String(file_url(name));
                }
            }
        }
    }
    manifest
}

fn file_url(name: &str) -> String {
    format!("/gee/file/{}", name)
}

async fn serve_file(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
) -> Response {
    if !is_safe_name(&name) {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    let path = state.downloads_dir.join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = content_type_for(&name);
            ([(header::CONTENT_TYPE, mime)], bytes).into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// Only plain file names are served; anything that could climb out of
/// the downloads directory is refused.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".tif") || lower.ends_with(".tiff") {
        "image/tiff"
    } else if lower.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}
