use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use crate::engine::rides::NewRide;
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::ride::{RidePriority, RideRequest, RideStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/request_ride", post(request_ride))
        .route("/request_ride_container", post(request_ride_container))
        .route("/add_to_queue", post(add_to_queue))
        .route("/rides/:user_id", get(rides_by_user))
        .route("/assign_driver", post(assign_driver))
        .route("/complete_ride/:driver_id", post(complete_ride))
        .route("/queue_status", get(queue_status))
}

#[derive(Deserialize)]
struct CreateRideRequest {
    user_id: i64,
    pickup_location: String,
    drop_location: String,
    pickup_lat: f64,
    pickup_lon: f64,
    drop_lat: f64,
    drop_lon: f64,
    #[serde(default)]
    priority: Option<RidePriority>,
}

impl CreateRideRequest {
    fn into_new_ride(self) -> NewRide {
        NewRide {
            user_id: self.user_id,
            pickup_location: self.pickup_location,
            drop_location: self.drop_location,
            pickup_lat: self.pickup_lat,
            pickup_lon: self.pickup_lon,
            drop_lat: self.drop_lat,
            drop_lon: self.drop_lon,
            priority: self.priority.unwrap_or_default(),
        }
    }
}

async fn request_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRideRequest>,
) -> Result<Json<RideRequest>, AppError> {
    let ride = state
        .rides
        .create(payload.into_new_ride(), RideStatus::Requested)?;
    Ok(Json(ride))
}

#[derive(Serialize)]
struct ContainerRideResponse {
    #[serde(flatten)]
    ride: RideRequest,
    container_port: u16,
    container_url: String,
    container_id: String,
}

async fn request_ride_container(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRideRequest>,
) -> Result<Json<ContainerRideResponse>, AppError> {
    let ride = state
        .rides
        .create(payload.into_new_ride(), RideStatus::Requested)?;

    let instance = state.orchestrator.provision(&ride).await?;

    Ok(Json(ContainerRideResponse {
        ride,
        container_port: instance.host_port,
        container_url: instance.url,
        container_id: instance.container_id,
    }))
}

#[derive(Serialize)]
struct QueuePositionResponse {
    ride_id: i64,
    queue_position: usize,
}

async fn add_to_queue(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRideRequest>,
) -> Result<Json<QueuePositionResponse>, AppError> {
    let ride = state
        .rides
        .create(payload.into_new_ride(), RideStatus::Queued)?;
    let queue_position = state.queue.enqueue(ride.id)?;
    state.metrics.rides_in_queue.set(state.queue.len() as i64);

    Ok(Json(QueuePositionResponse {
        ride_id: ride.id,
        queue_position,
    }))
}

async fn rides_by_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Json<Vec<RideRequest>> {
    Json(state.rides.by_user(user_id))
}

#[derive(Serialize)]
struct AssignmentResponse {
    driver: Driver,
    request: RideRequest,
    distance_km: f64,
    eta_minutes: f64,
    assigned_at: chrono::DateTime<chrono::Utc>,
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AssignmentResponse>, AppError> {
    let assignment = match state.matcher.assign_next() {
        Ok(assignment) => {
            state
                .metrics
                .assignments_total
                .with_label_values(&["success"])
                .inc();
            assignment
        }
        Err(err) => {
            state
                .metrics
                .assignments_total
                .with_label_values(&["error"])
                .inc();
            return Err(err);
        }
    };
    state.metrics.rides_in_queue.set(state.queue.len() as i64);

    let driver = state.registry.get(assignment.driver_id)?;
    let request = state.rides.get(assignment.ride_id)?;

    Ok(Json(AssignmentResponse {
        driver,
        request,
        distance_km: assignment.distance_km,
        eta_minutes: assignment.eta_minutes,
        assigned_at: assignment.assigned_at,
    }))
}

#[derive(Serialize)]
struct CompleteRideResponse {
    status: &'static str,
    ride_id: i64,
    driver_id: i64,
}

async fn complete_ride(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<i64>,
) -> Result<Json<CompleteRideResponse>, AppError> {
    let ride_id = state.matcher.complete_ride(driver_id)?;

    // Best-effort: a container ride hands its endpoint back on completion.
    state.orchestrator.release_for_ride(ride_id).await;

    Ok(Json(CompleteRideResponse {
        status: "completed",
        ride_id,
        driver_id,
    }))
}

#[derive(Serialize)]
struct QueueStatusResponse {
    rides_in_queue: usize,
    available_drivers: usize,
}

async fn queue_status(State(state): State<Arc<AppState>>) -> Json<QueueStatusResponse> {
    Json(QueueStatusResponse {
        rides_in_queue: state.queue.len(),
        available_drivers: state.registry.list_available().len(),
    })
}
