use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::container::ContainerInstance;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ride_containers", get(list_containers))
        .route("/ride_container/:ride_id", get(get_container))
        .route("/ride_container/:ride_id/logs", get(container_logs))
        .route("/ride_container/:ride_id/stop", post(stop_container))
        .route("/cleanup_containers", post(cleanup_containers))
}

#[derive(Serialize)]
struct ContainerListResponse {
    total_containers: usize,
    containers: Vec<ContainerInstance>,
}

async fn list_containers(State(state): State<Arc<AppState>>) -> Json<ContainerListResponse> {
    let containers = state.orchestrator.list();
    Json(ContainerListResponse {
        total_containers: containers.len(),
        containers,
    })
}

async fn get_container(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<i64>,
) -> Result<Json<ContainerInstance>, AppError> {
    Ok(Json(state.orchestrator.get(ride_id)?))
}

#[derive(Deserialize)]
struct LogsParams {
    #[serde(default = "default_tail")]
    tail: usize,
}

fn default_tail() -> usize {
    50
}

#[derive(Serialize)]
struct LogsResponse {
    ride_id: i64,
    logs: String,
}

async fn container_logs(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<i64>,
    Query(params): Query<LogsParams>,
) -> Result<Json<LogsResponse>, AppError> {
    let logs = state.orchestrator.logs(ride_id, params.tail).await?;
    Ok(Json(LogsResponse { ride_id, logs }))
}

#[derive(Serialize)]
struct StopResponse {
    status: &'static str,
    ride_id: i64,
    host_port: u16,
}

async fn stop_container(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<i64>,
) -> Result<Json<StopResponse>, AppError> {
    let instance = state.orchestrator.stop(ride_id).await?;
    Ok(Json(StopResponse {
        status: "stopped",
        ride_id,
        host_port: instance.host_port,
    }))
}

#[derive(Serialize)]
struct CleanupResponse {
    stopped_count: usize,
}

async fn cleanup_containers(State(state): State<Arc<AppState>>) -> Json<CleanupResponse> {
    let stopped_count = state.orchestrator.cleanup_all().await;
    Json(CleanupResponse { stopped_count })
}
