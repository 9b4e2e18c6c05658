// handlers.rs

use crate::{
    commands::{self, CommandRequest},
    devices::RegistryError,
    error::{AppError, ErrorBody},
    metrics,
    models::{AppState, DeviceDescriptor, DeviceList, UpdateDescriptionRequest, UpdateLocationRequest},
    status::DeviceStatusResponse,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{Method, StatusCode, header},
    response::IntoResponse,
    routing::{get, put},
};
use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use std::{collections::BTreeMap, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};
use tracing::{info, warn};
use validator::Validate;

/// Gateway routes with CORS and a request body limit applied.
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/v1/devices", get(list_devices))
        .route("/api/v1/devices/", get(list_devices))
        .route("/api/v1/devices/status", get(get_all_device_status))
        .route("/api/v1/devices/{device_id}", get(get_device))
        .route("/api/v1/devices/{device_id}/location", put(update_location))
        .route("/api/v1/devices/{device_id}/description", put(update_description))
        .route("/api/v1/devices/{device_id}/status", get(get_device_status))
        .route(
            "/api/v1/devices/{device_id}/commands/{command}",
            get(execute_command_get)
                .post(execute_command_post)
                .put(execute_command_put),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors())
        .with_state(state)
}

/// Every response allows any origin; `OPTIONS` requests are answered as
/// preflights before routing.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
            Method::HEAD,
        ])
}

#[utoipa::path(
    get,
    path = "/api/v1/devices/",
    tag = "devices",
    responses(
        (status = 200, description = "All configured devices", body = DeviceList),
        (status = 404, description = "No device is configured", body = ErrorBody)
    )
)]
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let devices = state.registry.list_devices().await;
    if devices.is_empty() {
        return Err(AppError::NoDevices);
    }
    Ok(Json(DeviceList { devices }))
}

#[utoipa::path(
    get,
    path = "/api/v1/devices/{device_id}",
    tag = "devices",
    params(("device_id" = String, Path, description = "Device identifier, matched ignoring case")),
    responses(
        (status = 200, description = "Device configuration", body = DeviceDescriptor),
        (status = 404, description = "Unknown device", body = ErrorBody)
    )
)]
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let device = state
        .registry
        .find_device(&device_id)
        .await
        .ok_or_else(|| AppError::DeviceNotFound(device_id.clone()))?;
    Ok(Json(device))
}

#[utoipa::path(
    put,
    path = "/api/v1/devices/{device_id}/location",
    tag = "devices",
    params(("device_id" = String, Path, description = "Device identifier")),
    request_body = UpdateLocationRequest,
    responses(
        (status = 200, description = "Location updated"),
        (status = 304, description = "Unreadable body, or the registry could not store the change"),
        (status = 417, description = "Empty location, or unknown device", body = ErrorBody)
    )
)]
pub async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: UpdateLocationRequest = parse_update(&body)?;
    state
        .registry
        .update_location(&device_id, &request.is_in)
        .await
        .map_err(update_error)?;
    Ok(StatusCode::OK)
}

#[utoipa::path(
    put,
    path = "/api/v1/devices/{device_id}/description",
    tag = "devices",
    params(("device_id" = String, Path, description = "Device identifier")),
    request_body = UpdateDescriptionRequest,
    responses(
        (status = 200, description = "Description updated"),
        (status = 304, description = "Unreadable body, or the registry could not store the change"),
        (status = 417, description = "Empty description, or unknown device", body = ErrorBody)
    )
)]
pub async fn update_description(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: UpdateDescriptionRequest = parse_update(&body)?;
    state
        .registry
        .update_description(&device_id, &request.description)
        .await
        .map_err(update_error)?;
    Ok(StatusCode::OK)
}

fn parse_update<T: DeserializeOwned + Validate>(body: &[u8]) -> Result<T, AppError> {
    if body.trim_ascii().is_empty() {
        return Err(AppError::Validation("request body is empty".into()));
    }
    // unreadable JSON leaves the device untouched, a readable body with the
    // wrong fields is a failed expectation
    let request: T = serde_json::from_slice(body).map_err(|e| {
        if e.is_syntax() || e.is_eof() {
            AppError::NotModified(e.to_string())
        } else {
            AppError::Validation(e.to_string())
        }
    })?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    Ok(request)
}

fn update_error(err: RegistryError) -> AppError {
    warn!(error = %err, "Device update failed");
    match err {
        RegistryError::UnknownDevice(_) => AppError::UpdateRejected(err.to_string()),
        RegistryError::UpdateFailed(_) => AppError::NotModified(err.to_string()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/devices/{device_id}/status",
    tag = "devices",
    params(("device_id" = String, Path, description = "Device identifier")),
    responses(
        (status = 200, description = "Current device status", body = DeviceStatusResponse),
        (status = 404, description = "Unknown device", body = ErrorBody)
    )
)]
pub async fn get_device_status(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    metrics::record_status_request();
    let runtime = state
        .registry
        .runtime_status(&device_id)
        .await
        .ok_or_else(|| AppError::DeviceNotFound(device_id.clone()))?;
    Ok(Json(DeviceStatusResponse::from_runtime(device_id, &runtime)))
}

#[utoipa::path(
    get,
    path = "/api/v1/devices/status",
    tag = "devices",
    responses(
        (status = 200, description = "Status of every registered device, keyed by id", body = BTreeMap<String, DeviceStatusResponse>),
        (status = 404, description = "No device is registered", body = ErrorBody)
    )
)]
pub async fn get_all_device_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    metrics::record_status_request();
    let devices = state.registry.list_devices().await;
    let registry = &state.registry;

    let statuses = join_all(devices.iter().map(|device| async move {
        registry
            .runtime_status(&device.id)
            .await
            .map(|runtime| DeviceStatusResponse::from_runtime(device.id.clone(), &runtime))
    }))
    .await;

    let all: BTreeMap<String, DeviceStatusResponse> = statuses
        .into_iter()
        .flatten()
        .map(|status| (status.id.clone(), status))
        .collect();
    if all.is_empty() {
        return Err(AppError::NoDevices);
    }
    Ok(Json(all))
}

#[utoipa::path(
    get,
    path = "/api/v1/devices/{device_id}/commands/{command}",
    tag = "commands",
    params(
        ("device_id" = String, Path, description = "Device identifier"),
        ("command" = String, Path, description = "Command name")
    ),
    responses(
        (status = 200, description = "Command executed"),
        (status = 417, description = "Command not executed", body = ErrorBody)
    )
)]
pub async fn execute_command_get(
    State(state): State<Arc<AppState>>,
    Path((device_id, command)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    execute_command(&state, &device_id, &command, None).await
}

#[utoipa::path(
    post,
    path = "/api/v1/devices/{device_id}/commands/{command}",
    tag = "commands",
    params(
        ("device_id" = String, Path, description = "Device identifier"),
        ("command" = String, Path, description = "Command name")
    ),
    request_body(content = String, content_type = "application/json", description = "Optional `{\"value\": ...}` parameter document"),
    responses(
        (status = 200, description = "Command executed"),
        (status = 417, description = "Parameters not understood or command not executed", body = ErrorBody)
    )
)]
pub async fn execute_command_post(
    State(state): State<Arc<AppState>>,
    Path((device_id, command)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    execute_command(&state, &device_id, &command, Some(&body[..])).await
}

#[utoipa::path(
    put,
    path = "/api/v1/devices/{device_id}/commands/{command}",
    tag = "commands",
    params(
        ("device_id" = String, Path, description = "Device identifier"),
        ("command" = String, Path, description = "Command name")
    ),
    request_body(content = String, content_type = "application/json", description = "Optional `{\"value\": ...}` parameter document"),
    responses(
        (status = 200, description = "Command executed"),
        (status = 417, description = "Parameters not understood or command not executed", body = ErrorBody)
    )
)]
pub async fn execute_command_put(
    State(state): State<Arc<AppState>>,
    Path((device_id, command)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    execute_command(&state, &device_id, &command, Some(&body[..])).await
}

async fn execute_command(
    state: &AppState,
    device_id: &str,
    command: &str,
    parameters: Option<&[u8]>,
) -> Result<StatusCode, AppError> {
    info!(device_id, command, "Command requested");
    commands::dispatch(
        state.executor.as_ref(),
        &state.shapes,
        CommandRequest {
            device_id,
            command,
            parameters,
        },
    )
    .await?;
    Ok(StatusCode::OK)
}
