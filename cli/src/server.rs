use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::ApiKey;
use bob_core::models::{
    CalibrationRecord, CalibrationResult, FoodEntry, NewFoodEntry, NewProfile, NewWeightEntry,
    Profile, WeightEntry, WeightUnit, validate_goal, validate_meal_label,
};
use bob_core::service::{BatchOutcome, BobService};

const BODY_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<BobService>>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateUserRequest {
    name: String,
    #[serde(default = "default_goal")]
    goal: String,
    daily_calorie_target: i64,
}

fn default_goal() -> String {
    "maintain".to_string()
}

#[derive(Deserialize)]
struct SetTargetRequest {
    calories: i64,
}

#[derive(Deserialize)]
struct CreateWeightRequest {
    date: String,
    weight: f64,
    #[serde(default = "default_unit")]
    unit: String,
}

fn default_unit() -> String {
    "kg".to_string()
}

#[derive(Deserialize)]
struct CreateFoodRequest {
    date: String,
    meal_label: String,
    #[serde(default)]
    items: Vec<String>,
    total_calories: f64,
    total_protein: Option<f64>,
    total_carbs: Option<f64>,
    total_fat: Option<f64>,
}

#[derive(Deserialize, Default)]
struct CalibrateRequest {
    window_days: Option<i64>,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Deserialize)]
struct HistoryQuery {
    days: Option<i64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                eprintln!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn parse_api_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- User handlers ---

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    let goal = validate_goal(&req.goal).map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    if req.daily_calorie_target <= 0 {
        return Err(ApiError::BadRequest(
            "daily_calorie_target must be greater than 0".to_string(),
        ));
    }

    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let profile = svc
        .create_profile(&NewProfile {
            name,
            goal,
            daily_calorie_target: req.daily_calorie_target,
        })
        .map_err(|e| ApiError::BadRequest(format!("{e:#}")))?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<Profile>>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let profiles = svc.list_profiles().context("database error")?;
    Ok(Json(profiles))
}

async fn get_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Profile>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let profile = svc
        .get_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    Ok(Json(profile))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.delete_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_user_target(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SetTargetRequest>,
) -> Result<Json<Profile>, ApiError> {
    if req.calories <= 0 {
        return Err(ApiError::BadRequest(
            "calories must be greater than 0".to_string(),
        ));
    }
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    let profile = svc
        .set_target(&name, req.calories)
        .context("failed to set target")?;
    Ok(Json(profile))
}

// --- Weight handlers ---

async fn create_weight(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<CreateWeightRequest>,
) -> Result<(StatusCode, Json<WeightEntry>), ApiError> {
    let date = parse_api_date(&req.date)?;
    let unit = WeightUnit::parse(&req.unit).map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    if req.weight <= 0.0 {
        return Err(ApiError::BadRequest(
            "weight must be greater than 0".to_string(),
        ));
    }

    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    let entry = svc
        .log_weight(
            &name,
            &NewWeightEntry {
                date,
                weight: req.weight,
                unit,
            },
        )
        .context("failed to insert weight entry")?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_weight_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<WeightEntry>>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    let entries = svc
        .weight_history(&name, params.days)
        .context("database error")?;
    Ok(Json(entries))
}

async fn delete_weight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.delete_weight(id)
        .map_err(|_| ApiError::NotFound(format!("Weight entry {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Food handlers ---

async fn create_food(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<CreateFoodRequest>,
) -> Result<(StatusCode, Json<FoodEntry>), ApiError> {
    let date = parse_api_date(&req.date)?;
    let meal_label =
        validate_meal_label(&req.meal_label).map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    if req.total_calories < 0.0 {
        return Err(ApiError::BadRequest(
            "total_calories must not be negative".to_string(),
        ));
    }

    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    let entry = svc
        .log_food(
            &name,
            &NewFoodEntry {
                date,
                meal_label,
                items: req.items,
                total_calories: req.total_calories,
                total_protein: req.total_protein,
                total_carbs: req.total_carbs,
                total_fat: req.total_fat,
            },
        )
        .context("failed to insert food entry")?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_food_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<FoodEntry>>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    let entries = svc
        .food_history(&name, params.days)
        .context("database error")?;
    Ok(Json(entries))
}

async fn get_day_summary(
    State(state): State<AppState>,
    Path((name, date_str)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_api_date(&date_str)?;
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    let summary = svc.day_summary(&name, date).context("database error")?;
    let value = serde_json::to_value(summary).context("failed to serialize summary")?;
    Ok(Json(value))
}

async fn delete_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.delete_food(id)
        .map_err(|_| ApiError::NotFound(format!("Food entry {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Calibration handlers ---

async fn calibrate_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<CalibrateRequest>,
) -> Result<Json<CalibrationResult>, ApiError> {
    let window = req.window_days.unwrap_or(BobService::default_window_days());
    if window <= 0 {
        return Err(ApiError::BadRequest(
            "window_days must be greater than 0".to_string(),
        ));
    }

    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    let result = svc
        .calibrate(&name, window, req.dry_run)
        .context("calibration failed")?;
    Ok(Json(result))
}

async fn calibrate_all(
    State(state): State<AppState>,
    Json(req): Json<CalibrateRequest>,
) -> Result<Json<Vec<BatchOutcome>>, ApiError> {
    let window = req.window_days.unwrap_or(BobService::default_window_days());
    if window <= 0 {
        return Err(ApiError::BadRequest(
            "window_days must be greater than 0".to_string(),
        ));
    }

    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let outcomes = svc
        .calibrate_all(window, req.dry_run)
        .context("batch calibration failed")?;
    Ok(Json(outcomes))
}

async fn get_calibrations(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<CalibrationRecord>>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_profile(&name)
        .map_err(|_| ApiError::NotFound(format!("Profile '{name}' not found")))?;
    let records = svc.calibration_history(&name).context("database error")?;
    Ok(Json(records))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/users", post(create_user).get(list_users))
        .route("/api/users/{name}", get(get_user).delete(delete_user))
        .route("/api/users/{name}/target", put(set_user_target))
        .route(
            "/api/users/{name}/weight",
            post(create_weight).get(get_weight_history),
        )
        .route("/api/weight/{id}", delete(delete_weight))
        .route(
            "/api/users/{name}/food",
            post(create_food).get(get_food_history),
        )
        .route("/api/users/{name}/summary/{date}", get(get_day_summary))
        .route("/api/food/{id}", delete(delete_food))
        .route("/api/users/{name}/calibrate", post(calibrate_user))
        .route("/api/users/{name}/calibrations", get(get_calibrations))
        .route("/api/calibrate", post(calibrate_all))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: BobService,
    port: u16,
    bind: &str,
    api_key: Option<ApiKey>,
) -> anyhow::Result<()> {
    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {} (see api_key file in data directory)",
            key.masked()
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    let auth_enabled = api_key.is_some();
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        api_key: api_key.map(ApiKey::into_inner),
    };

    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" && !auth_enabled {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
