use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    db::DatabaseTrait,
    error::AppError,
    watering::ds::AppState,
    weather::{fetch::fetch_and_store, ForecastDay, ForecastEntry},
};

pub async fn forecast_days(State(app_state): State<Arc<AppState>>) -> Result<Json<Vec<ForecastDay>>, AppError> {
    Ok(Json(app_state.db.forecast_days()?))
}

/// Entries for one stored day; an unknown date simply yields an empty list.
pub async fn forecast_for_day(
    State(app_state): State<Arc<AppState>>, Path(date): Path<String>,
) -> Result<Json<Vec<ForecastEntry>>, AppError> {
    Ok(Json(app_state.db.forecast_for_day(date)?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub added: Vec<String>,
}

/// On-demand fetch, same pipeline as the daily job.
pub async fn refresh(State(app_state): State<Arc<AppState>>) -> Result<Json<RefreshResponse>, AppError> {
    let added = fetch_and_store(&app_state.db, &app_state.weather_cfg).await?;
    Ok(Json(RefreshResponse { added }))
}
