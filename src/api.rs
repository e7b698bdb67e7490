use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::info;

use crate::{
    db::DatabaseTrait,
    error::AppError,
    time::TimeProvider,
    watering::ds::{AppState, NewPlant, Plant, WateringEvent},
    weather,
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::PlantNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyRunning(_) | AppError::NotRunning(_) => StatusCode::CONFLICT,
            AppError::ConfigError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub duration_secs: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WaterCommandResponse {
    pub plant_id: u32,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlantStatusResponse {
    pub plant_id: u32,
    pub watering: bool,
    pub checked_at: i64,
}

pub async fn list_plants(State(app_state): State<Arc<AppState>>) -> Result<Json<Vec<Plant>>, AppError> {
    Ok(Json(app_state.db.load_plants()?))
}

pub async fn create_plant(
    State(app_state): State<Arc<AppState>>, Json(new): Json<NewPlant>,
) -> Result<(StatusCode, Json<Plant>), AppError> {
    let plant = app_state.launcher.create_plant(new)?;
    Ok((StatusCode::CREATED, Json(plant)))
}

pub async fn delete_plant(
    State(app_state): State<Arc<AppState>>, Path(plant_id): Path<u32>,
) -> Result<StatusCode, AppError> {
    app_state.launcher.delete_plant(plant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns as soon as the task is dispatched; the watering itself outlives
/// this request.
pub async fn start_watering(
    State(app_state): State<Arc<AppState>>, Path(plant_id): Path<u32>, body: Option<Json<StartRequest>>,
) -> Result<Json<WaterCommandResponse>, AppError> {
    let duration_secs = body.and_then(|Json(req)| req.duration_secs);
    app_state.launcher.start(plant_id, duration_secs)?;
    Ok(Json(WaterCommandResponse { plant_id, status: "started".to_owned() }))
}

/// The device switches off within one tick of this request returning.
pub async fn stop_watering(
    State(app_state): State<Arc<AppState>>, Path(plant_id): Path<u32>,
) -> Result<Json<WaterCommandResponse>, AppError> {
    app_state.launcher.cancel(plant_id)?;
    Ok(Json(WaterCommandResponse { plant_id, status: "stopping".to_owned() }))
}

pub async fn watering_status(
    State(app_state): State<Arc<AppState>>, Path(plant_id): Path<u32>,
) -> Result<Json<PlantStatusResponse>, AppError> {
    let watering = app_state.launcher.is_watering(plant_id)?;
    Ok(Json(PlantStatusResponse { plant_id, watering, checked_at: app_state.time_provider.now() }))
}

pub async fn watering_history(
    State(app_state): State<Arc<AppState>>, Path(plant_id): Path<u32>,
) -> Result<Json<Vec<WateringEvent>>, AppError> {
    if app_state.db.get_plant(plant_id)?.is_none() {
        return Err(AppError::PlantNotFound(plant_id));
    }
    Ok(Json(app_state.db.watering_history(plant_id)?))
}

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/plants", get(list_plants).post(create_plant))
        .route("/plants/:plant_id", delete(delete_plant))
        .route("/water/:plant_id", get(watering_status))
        .route("/water/:plant_id/start", post(start_watering))
        .route("/water/:plant_id/stop", post(stop_watering))
        .route("/water/:plant_id/history", get(watering_history))
        .route("/weather", get(weather::api::forecast_days))
        .route("/weather/refresh", post(weather::api::refresh))
        .route("/weather/:date", get(weather::api::forecast_for_day))
        .with_state(app_state)
}

pub async fn run_web_server(
    app_state: Arc<AppState>, addr: SocketAddr, mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let app = router(app_state);
    let handle = axum_server::Handle::new();
    let watcher = handle.clone();
    tokio::spawn(async move {
        while shutdown_rx.changed().await.is_ok() {
            if *shutdown_rx.borrow() {
                watcher.graceful_shutdown(Some(Duration::from_secs(5)));
                break;
            }
        }
    });
    info!("Starting HTTP server on http://{}", addr);
    axum_server::Server::bind(addr).handle(handle).serve(app.into_make_service()).await
}
