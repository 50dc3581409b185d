use crate::errors::Error;
use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};
use crate::model::{Alert, AlertId, Device, DeviceId, MaintenanceEvent, Plan, PlanId, Reading};
use crate::ports::{CreateMaintenanceInput, PlanInput};
use crate::usecase::{
    AddReadingCommand, AlertComputer, AlertService, ComputeAlertInput, ComputeAlertOutput,
    CreateDeviceCommand, DeviceService, MaintenanceService, MarkServicedInput, PlanService,
    ReadingService, UpdateDeviceBasicCommand, UpdateDevicePlanCommand,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, MatchedPath, Request, State,
    },
    http::{header::HeaderValue, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

pub const ACTOR_HEADER: &str = "x-actor";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 1000;

#[derive(Clone)]
pub struct AppState {
    pub devices: Arc<DeviceService>,
    pub plans: Arc<PlanService>,
    pub readings: Arc<ReadingService>,
    pub alerts: Arc<AlertService>,
    pub maintenance: Arc<MaintenanceService>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

impl PageQuery {
    /// Limit clamped to `[1, 1000]` (default 50), offset to `>= 0`
    fn bounds(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateDeviceRequest {
    serial_number: String,
    name: String,
    model: Option<String>,
    manufacturer: Option<String>,
    year: i32,
    commission_date: Option<NaiveDate>,
    status: Option<String>,
    location: Option<String>,
    plan_id: Option<PlanId>,
    total_hours: Option<i32>,
    after_overhaul_hours: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    name: String,
    status: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanRequest {
    plan_id: Option<PlanId>,
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    name: String,
    #[serde(default)]
    interval_hours: i32,
    threshold_min: Option<f64>,
    threshold_max: Option<f64>,
    description: Option<String>,
}

impl From<PlanRequest> for PlanInput {
    fn from(req: PlanRequest) -> Self {
        PlanInput {
            name: req.name,
            interval_hours: req.interval_hours,
            threshold_min: req.threshold_min,
            threshold_max: req.threshold_max,
            description: req.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadingRequest {
    device_id: DeviceId,
    value: f64,
    at: Option<DateTime<Utc>>,
    location: Option<String>,
    operator_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceAlertRequest {
    serviced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    at: Option<DateTime<Utc>>,
    interval_hours: Option<i32>,
    notes: Option<String>,
    performed_by: Option<String>,
    cost: Option<f64>,
}

/// JSON body whose rejections render through `AppError`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/devices", post(create_device).get(list_devices))
        .route(
            "/devices/:id",
            get(get_device).patch(update_device).delete(delete_device),
        )
        .route("/devices/:id/plan", patch(update_device_plan))
        .route("/devices/:id/readings", get(list_readings))
        .route("/devices/:id/readings/last", get(last_reading))
        .route("/devices/:id/alerts", get(list_open_alerts))
        .route(
            "/devices/:id/maintenance",
            post(record_maintenance).get(list_maintenance),
        )
        .route("/plans", post(create_plan).get(list_plans))
        .route(
            "/plans/:id",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
        .route("/readings", post(add_reading))
        .route("/alerts/compute", post(compute_alert))
        .route("/alerts/:id/service", post(service_alert));

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(track_requests))
        .with_state(state)
}

/// `None` allows any origin
pub fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let allow_origin = match origins {
        None => AllowOrigin::from(Any),
        Some(origins) => AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn track_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!("http_request", %method, %route, %request_id);
    let mut response = next.run(req).instrument(span.clone()).await;

    let elapsed = start.elapsed();
    let status = response.status();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &route, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &route])
        .observe(elapsed.as_secs_f64());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    span.in_scope(|| {
        debug!(
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );
    });
    response
}

fn actor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

async fn create_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateDeviceRequest>,
) -> Result<(StatusCode, Json<Device>), AppError> {
    let device = state
        .devices
        .create(CreateDeviceCommand {
            serial_number: req.serial_number,
            name: req.name,
            model: req.model,
            manufacturer: req.manufacturer,
            year: req.year,
            commission_date: req.commission_date,
            status: req.status,
            location: req.location,
            plan_id: req.plan_id,
            total_hours: req.total_hours,
            after_overhaul_hours: req.after_overhaul_hours,
            actor: actor(&headers),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(device)))
}

async fn list_devices(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Device>>, AppError> {
    let (limit, offset) = page.bounds();
    Ok(Json(state.devices.list(limit, offset).await?))
}

async fn get_device(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
) -> Result<Json<Device>, AppError> {
    Ok(Json(state.devices.get(id).await?))
}

async fn update_device(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UpdateDeviceRequest>,
) -> Result<Json<Device>, AppError> {
    let device = state
        .devices
        .update_basic(UpdateDeviceBasicCommand {
            id,
            name: req.name,
            status: req.status,
            location: req.location,
            actor: actor(&headers),
        })
        .await?;

    Ok(Json(device))
}

async fn update_device_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UpdatePlanRequest>,
) -> Result<Json<Device>, AppError> {
    let device = state
        .devices
        .update_plan(UpdateDevicePlanCommand {
            id,
            plan_id: req.plan_id,
            actor: actor(&headers),
        })
        .await?;

    Ok(Json(device))
}

async fn delete_device(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    state.devices.soft_delete(id, actor(&headers)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_readings(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Reading>>, AppError> {
    let (limit, offset) = page.bounds();
    Ok(Json(state.readings.list(id, limit, offset).await?))
}

async fn last_reading(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
) -> Result<Json<Reading>, AppError> {
    Ok(Json(state.readings.last(id).await?))
}

async fn list_open_alerts(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let (limit, offset) = page.bounds();
    Ok(Json(state.alerts.list_open(id, limit, offset).await?))
}

async fn record_maintenance(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<MaintenanceRequest>,
) -> Result<(StatusCode, Json<MaintenanceEvent>), AppError> {
    let event = state
        .maintenance
        .record(CreateMaintenanceInput {
            device_id: id,
            at: req.at,
            interval_hours: req.interval_hours,
            notes: req.notes,
            performed_by: req.performed_by.or_else(|| actor(&headers)),
            cost: req.cost,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(event)))
}

async fn list_maintenance(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DeviceId>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<Json<Vec<MaintenanceEvent>>, AppError> {
    let (limit, offset) = page.bounds();
    Ok(Json(state.maintenance.list(id, limit, offset).await?))
}

async fn create_plan(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PlanRequest>,
) -> Result<(StatusCode, Json<Plan>), AppError> {
    let plan = state.plans.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn list_plans(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> Result<Json<Vec<Plan>>, AppError> {
    let (limit, offset) = page.bounds();
    Ok(Json(state.plans.list(limit, offset).await?))
}

async fn get_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PlanId>,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(state.plans.get(id).await?))
}

async fn update_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PlanId>,
    ApiJson(req): ApiJson<PlanRequest>,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(state.plans.update(id, req.into()).await?))
}

async fn delete_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<PlanId>,
) -> Result<StatusCode, AppError> {
    state.plans.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_reading(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReadingRequest>,
) -> Result<(StatusCode, Json<Reading>), AppError> {
    let reading = state
        .readings
        .ingest(AddReadingCommand {
            device_id: req.device_id,
            value: req.value,
            at: req.at,
            location: req.location,
            operator_id: req.operator_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(reading)))
}

async fn compute_alert(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ComputeAlertInput>,
) -> Result<(StatusCode, Json<ComputeAlertOutput>), AppError> {
    let out = state.alerts.compute(input).await?;
    let status = if out.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(out)))
}

async fn service_alert(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AlertId>,
    body: Option<ApiJson<ServiceAlertRequest>>,
) -> Result<Json<Alert>, AppError> {
    let req = body.map(|ApiJson(req)| req).unwrap_or_default();
    let alert = state
        .alerts
        .resolve(MarkServicedInput {
            alert_id: id,
            serviced_at: req.serviced_at,
        })
        .await?;

    Ok(Json(alert))
}

pub struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => {
                Self(Error::Validation(e.body_text()))
            }
            other => Self(Error::Internal(other.body_text())),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg),
            other => {
                error!("API error: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };

        if status != StatusCode::INTERNAL_SERVER_ERROR {
            debug!(status = status.as_u16(), "Request rejected: {}", message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(PageQuery::default().bounds(), (50, 0));
        let page = PageQuery {
            limit: Some(0),
            offset: Some(-4),
        };
        assert_eq!(page.bounds(), (1, 0));
        let page = PageQuery {
            limit: Some(5000),
            offset: Some(20),
        };
        assert_eq!(page.bounds(), (1000, 20));
    }

    #[test]
    fn test_actor_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(actor(&headers), None);
        headers.insert(ACTOR_HEADER, HeaderValue::from_static("  "));
        assert_eq!(actor(&headers), None);
        headers.insert(ACTOR_HEADER, HeaderValue::from_static(" ops-1 "));
        assert_eq!(actor(&headers), Some("ops-1".to_string()));
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (Error::validation("bad"), StatusCode::BAD_REQUEST),
            (Error::not_found("device 1"), StatusCode::NOT_FOUND),
            (Error::Conflict("dup".to_string()), StatusCode::CONFLICT),
            (
                Error::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }
}
