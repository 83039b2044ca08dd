// Fuel Tracker - Web Server
// REST API with Axum over the same SQLite database the CLI writes

use axum::{
    extract::{Path, Query, State},
    http::{header::ACCEPT_LANGUAGE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, put},
    Router,
};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use fuel_tracker::preferences::DetectedLocale;
use fuel_tracker::{
    by_brand, by_grade, convert_by_code, dashboard, delete_fuel_entry, delete_vehicle, detect_request_locale,
    get_fuel_entry, get_vehicle, get_vehicles, insert_fuel_entry, insert_vehicle, load_metered_entries,
    observability, query_entries, setup_database, update_fuel_entry, update_vehicle, AppConfig,
    DashboardStatistics, EntryFilter, FuelEntry, FuelError, GroupStatistics, MeteredEntry, Period,
    UnitPreference, Vehicle,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<AppConfig>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal("database lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    issues: Vec<fuel_tracker::validation::ValidationIssue>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                code: "internal",
                message: message.into(),
                issues: Vec::new(),
            },
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                code: "bad_request",
                message: message.into(),
                issues: Vec::new(),
            },
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                code: "not_found",
                message: message.into(),
                issues: Vec::new(),
            },
        }
    }
}

impl From<FuelError> for ApiError {
    fn from(err: FuelError) -> Self {
        let code = match &err {
            FuelError::UnknownUnit(_) => "unknown_unit",
            FuelError::IncompatibleUnits { .. } => "incompatible_units",
            FuelError::InvalidConsumption(_) => "invalid_consumption",
            FuelError::InvalidCurrency(_) => "invalid_currency",
            FuelError::InvalidPrecision(_) => "invalid_precision",
            FuelError::InvalidDate(_) => "invalid_date",
            FuelError::InvalidDatePattern(_) => "invalid_date_pattern",
            FuelError::InvalidPeriod(_) => "invalid_period",
            FuelError::Validation(_) => "validation_failed",
        };
        let issues = match &err {
            FuelError::Validation(issues) => issues.clone(),
            _ => Vec::new(),
        };
        ApiError {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                code,
                message: err.to_string(),
                issues,
            },
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<FuelError>() {
            Some(fuel) => fuel.clone().into(),
            None => {
                error!(error = %err, "request failed");
                ApiError::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.body),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/vehicles
async fn list_vehicles(State(state): State<AppState>) -> ApiResult<Vec<Vehicle>> {
    let conn = state.conn()?;
    Ok(ApiResponse::ok(get_vehicles(&conn)?))
}

/// Vehicle body; initial odometer in the configured distance unit
#[derive(Deserialize)]
struct VehicleRequest {
    name: String,
    #[serde(default)]
    make: String,
    #[serde(default)]
    model: String,
    year: Option<u16>,
    #[serde(default)]
    initial_odometer: f64,
    #[serde(default)]
    fuel_type: String,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_true() -> bool {
    true
}

impl VehicleRequest {
    fn into_vehicle(self, id: i64, pref: &UnitPreference) -> Vehicle {
        Vehicle {
            id,
            name: self.name,
            make: self.make,
            model: self.model,
            year: self.year,
            initial_odometer: pref.distance_to_canonical(self.initial_odometer).round() as i64,
            fuel_type: self.fuel_type,
            is_active: self.is_active,
        }
    }
}

/// POST /api/vehicles
async fn create_vehicle(
    State(state): State<AppState>,
    Json(body): Json<VehicleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vehicle>>), ApiError> {
    let vehicle = body.into_vehicle(0, &state.config.preferences);
    let conn = state.conn()?;
    let saved = insert_vehicle(&conn, &vehicle)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(saved)))
}

/// PUT /api/vehicles/:id
async fn edit_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<i64>,
    Json(body): Json<VehicleRequest>,
) -> ApiResult<Vehicle> {
    let vehicle = body.into_vehicle(vehicle_id, &state.config.preferences);
    let conn = state.conn()?;
    if get_vehicle(&conn, vehicle_id)?.is_none() {
        return Err(ApiError::not_found(format!("vehicle {} not found", vehicle_id)));
    }
    Ok(ApiResponse::ok(update_vehicle(&conn, &vehicle)?))
}

/// DELETE /api/vehicles/:id - also removes the vehicle's entries
async fn remove_vehicle(State(state): State<AppState>, Path(vehicle_id): Path<i64>) -> ApiResult<i64> {
    let conn = state.conn()?;
    if !delete_vehicle(&conn, vehicle_id)? {
        return Err(ApiError::not_found(format!("vehicle {} not found", vehicle_id)));
    }
    Ok(ApiResponse::ok(vehicle_id))
}

/// GET /api/entries?vehicle=&date_after=&date_before=&fuel_brand=&fuel_grade=&station_name=
async fn filter_entries(
    State(state): State<AppState>,
    Query(filter): Query<EntryFilter>,
) -> ApiResult<Vec<MeteredEntry>> {
    let conn = state.conn()?;
    Ok(ApiResponse::ok(query_entries(&conn, &filter)?))
}

/// GET /api/vehicles/:id/entries - fill-ups with derived metrics, canonical units
async fn list_entries(State(state): State<AppState>, Path(vehicle_id): Path<i64>) -> ApiResult<Vec<MeteredEntry>> {
    let conn = state.conn()?;
    if get_vehicle(&conn, vehicle_id)?.is_none() {
        return Err(ApiError::not_found(format!("vehicle {} not found", vehicle_id)));
    }
    Ok(ApiResponse::ok(load_metered_entries(&conn, Some(vehicle_id))?))
}

/// Fill-up body, in the configured display units
#[derive(Deserialize)]
struct EntryRequest {
    entry_date: NaiveDate,
    odometer: f64,
    volume: f64,
    total_amount: f64,
    #[serde(default)]
    station_name: String,
    #[serde(default)]
    fuel_brand: String,
    #[serde(default)]
    fuel_grade: String,
    #[serde(default)]
    notes: String,
}

impl EntryRequest {
    fn into_entry(self, id: i64, vehicle_id: i64, pref: &UnitPreference) -> Result<FuelEntry, ApiError> {
        if !self.odometer.is_finite() {
            return Err(ApiError::bad_request("odometer must be a finite number"));
        }
        Ok(FuelEntry {
            id,
            vehicle_id,
            entry_date: self.entry_date,
            odometer: pref.distance_to_canonical(self.odometer).round() as i64,
            station_name: self.station_name,
            fuel_brand: self.fuel_brand,
            fuel_grade: self.fuel_grade,
            liters: pref.volume_to_canonical(self.volume),
            total_amount: self.total_amount,
            notes: self.notes,
        })
    }
}

/// POST /api/vehicles/:id/entries
async fn create_entry(
    State(state): State<AppState>,
    Path(vehicle_id): Path<i64>,
    Json(body): Json<EntryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FuelEntry>>), ApiError> {
    let entry = body.into_entry(0, vehicle_id, &state.config.preferences)?;

    let conn = state.conn()?;
    if get_vehicle(&conn, vehicle_id)?.is_none() {
        return Err(ApiError::not_found(format!("vehicle {} not found", vehicle_id)));
    }
    let saved = insert_fuel_entry(&conn, &entry, Local::now().date_naive())?;
    Ok((StatusCode::CREATED, ApiResponse::ok(saved)))
}

/// PUT /api/entries/:id - metrics of later entries follow on the next read
async fn edit_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<i64>,
    Json(body): Json<EntryRequest>,
) -> ApiResult<FuelEntry> {
    let conn = state.conn()?;
    let stored = get_fuel_entry(&conn, entry_id)?
        .ok_or_else(|| ApiError::not_found(format!("entry {} not found", entry_id)))?;
    let entry = body.into_entry(entry_id, stored.vehicle_id, &state.config.preferences)?;
    Ok(ApiResponse::ok(update_fuel_entry(&conn, &entry, Local::now().date_naive())?))
}

/// DELETE /api/entries/:id
async fn remove_entry(State(state): State<AppState>, Path(entry_id): Path<i64>) -> ApiResult<i64> {
    let conn = state.conn()?;
    if !delete_fuel_entry(&conn, entry_id)? {
        return Err(ApiError::not_found(format!("entry {} not found", entry_id)));
    }
    Ok(ApiResponse::ok(entry_id))
}

#[derive(Deserialize)]
struct DashboardQuery {
    vehicle: Option<i64>,
    period: Option<String>,
    date_after: Option<NaiveDate>,
    date_before: Option<NaiveDate>,
}

/// GET /api/statistics/dashboard?vehicle=&period=&date_after=&date_before=
async fn dashboard_statistics(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<DashboardStatistics> {
    let period = Period::parse(
        query.period.as_deref().unwrap_or("30d"),
        query.date_after,
        query.date_before,
    )?;

    let conn = state.conn()?;
    let metered = load_metered_entries(&conn, query.vehicle)?;
    let vehicles = get_vehicles(&conn)?;
    let stats = dashboard(&metered, &vehicles, query.vehicle, period, Local::now().date_naive())?;
    Ok(ApiResponse::ok(stats))
}

#[derive(Deserialize)]
struct VehicleQuery {
    vehicle: Option<i64>,
}

/// GET /api/statistics/by-brand?vehicle=
async fn brand_statistics(
    State(state): State<AppState>,
    Query(query): Query<VehicleQuery>,
) -> ApiResult<Vec<GroupStatistics>> {
    let conn = state.conn()?;
    let metered = load_metered_entries(&conn, query.vehicle)?;
    Ok(ApiResponse::ok(by_brand(&metered, query.vehicle)))
}

/// GET /api/statistics/by-grade?vehicle=
async fn grade_statistics(
    State(state): State<AppState>,
    Query(query): Query<VehicleQuery>,
) -> ApiResult<Vec<GroupStatistics>> {
    let conn = state.conn()?;
    let metered = load_metered_entries(&conn, query.vehicle)?;
    Ok(ApiResponse::ok(by_grade(&metered, query.vehicle)))
}

#[derive(Deserialize)]
struct ConvertQuery {
    value: f64,
    from: String,
    to: String,
}

#[derive(Serialize)]
struct ConvertResponse {
    value: f64,
    from: String,
    to: String,
    result: f64,
}

/// GET /api/convert?value=&from=&to=
async fn convert(Query(query): Query<ConvertQuery>) -> ApiResult<ConvertResponse> {
    let result = convert_by_code(query.value, &query.from, &query.to)?;
    Ok(ApiResponse::ok(ConvertResponse {
        value: query.value,
        from: query.from,
        to: query.to,
        result,
    }))
}

/// GET /api/locale - currency and timezone guessed from Accept-Language,
/// timezone optionally taken from X-Timezone
async fn locale(headers: HeaderMap) -> ApiResult<DetectedLocale> {
    let accept_language = header_str(&headers, ACCEPT_LANGUAGE.as_str()).unwrap_or("");
    let timezone = header_str(&headers, "x-timezone");
    Ok(ApiResponse::ok(detect_request_locale(accept_language, timezone)))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/vehicles", get(list_vehicles).post(create_vehicle))
        .route("/vehicles/:id", put(edit_vehicle).delete(remove_vehicle))
        .route("/vehicles/:id/entries", get(list_entries).post(create_entry))
        .route("/entries", get(filter_entries))
        .route("/entries/:id", put(edit_entry).delete(remove_entry))
        .route("/statistics/dashboard", get(dashboard_statistics))
        .route("/statistics/by-brand", get(brand_statistics))
        .route("/statistics/by-grade", get(grade_statistics))
        .route("/convert", get(convert))
        .route("/locale", get(locale))
        .with_state(state)
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_tracing();

    let config = AppConfig::load()?;
    let conn = Connection::open(&config.database_path)?;
    setup_database(&conn)?;
    info!(path = %config.database_path.display(), "database opened");

    let addr = config.server.bind_addr.clone();
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: Arc::new(config),
    };

    let app = Router::new().nest("/api", api_routes(state)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
