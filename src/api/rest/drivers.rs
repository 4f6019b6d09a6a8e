use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::driver::{Driver, DriverSpec};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register_driver", post(register_driver))
        .route("/register_drivers_bulk", post(register_drivers_bulk))
        .route("/add_driver_location", post(add_driver_location))
        .route("/drivers", get(list_drivers))
        .route("/drivers/available", get(list_available_drivers))
        .route("/driver/:id", get(get_driver))
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DriverSpec>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.registry.register(payload)?;
    Ok(Json(driver))
}

#[derive(Deserialize)]
struct BulkRegisterRequest {
    drivers: Vec<DriverSpec>,
}

async fn register_drivers_bulk(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BulkRegisterRequest>,
) -> Result<Json<Vec<Driver>>, AppError> {
    let drivers = state.registry.register_bulk(payload.drivers)?;
    Ok(Json(drivers))
}

#[derive(Deserialize)]
struct LocationParams {
    driver_id: i64,
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn add_driver_location(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LocationParams>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .registry
        .update_location(params.driver_id, params.latitude, params.longitude)?;

    Ok(Json(MessageResponse {
        message: format!("location updated for driver {}", params.driver_id),
    }))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.registry.list())
}

async fn list_available_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.registry.list_available())
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(state.registry.get(id)?))
}
