use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod error;
mod labels;
mod model;
mod preprocess;
mod state;
mod utils;

use error::ApiError;
use model::{classify, default_strategies, PredictionResult};
use preprocess::IMAGE_SIZE;
use state::AppState;
use utils::{get_env, init_tracing};

const MODEL_PATH: &str = "./model/frozen_graph.pb";
const CLASS_LIST_PATH: &str = "./model/class_names.json";
const UPLOAD_FIELD: &str = "file";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let (body_limit_bytes, port) = get_env()?;

    info!(path = MODEL_PATH, "loading model");
    let state = AppState::load(
        Path::new(MODEL_PATH),
        Path::new(CLASS_LIST_PATH),
        &default_strategies(),
        IMAGE_SIZE,
    );
    if let Some(err) = state.model_error() {
        error!(error = err, "model unavailable, serving in degraded mode");
    }

    let app = app(Arc::new(state), body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

fn app(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    model_loaded: bool,
    model_path: String,
    model_error: Option<String>,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model_loaded = state.classifier().is_some();
    Json(HealthResponse {
        status: if model_loaded { "ok" } else { "error" },
        message: "ML backend running",
        model_loaded,
        model_path: state.model_path.display().to_string(),
        model_error: state.model_error().map(str::to_string),
    })
}

async fn predict_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let classifier = state
        .classifier()
        .ok_or_else(|| ApiError::ModelUnavailable(state.model_error().map(str::to_string)))?;

    let image_data = read_upload(multipart).await?;

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        classify(
            classifier.as_ref(),
            &worker_state.class_names,
            &image_data,
            worker_state.image_size,
        )
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    match result {
        Ok(prediction) => {
            info!(
                label = %prediction.prediction,
                confidence = prediction.confidence,
                "prediction served"
            );
            Ok(Json(prediction))
        }
        Err(err) => {
            warn!(error = %err, "prediction failed");
            Err(err.into())
        }
    }
}

/// Pulls the bytes of the `file` field out of the multipart body.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Vec<u8>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::InvalidUpload(e.to_string()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::InvalidUpload(e.to_string()))?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ApiError::InvalidUpload(format!(
        "no '{}' field in upload",
        UPLOAD_FIELD
    )))
}
