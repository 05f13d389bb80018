use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::commands::parse_time;
use sugarlog_core::models::{
    BloodSugarMetric, BloodSugarVariability, ChartSnapshot, ConsumptionRecord, Granularity,
    SugarSummary, User, validate_amount, validate_blood_sugar, validate_calendar_date,
    validate_email, validate_sugar_grams,
};
use sugarlog_core::service::{ConsumptionInput, SugarService};
use sugarlog_core::snapshot::SnapshotError;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<SugarService>>,
    api_key: Option<String>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, SugarService> {
        self.svc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateUserRequest {
    email: String,
    full_name: Option<String>,
}

#[derive(Deserialize)]
struct CreateConsumptionRequest {
    user_id: i64,
    date_time: String,
    #[serde(rename = "type")]
    category: String,
    amount: Option<f64>,
    sugar_grams: Option<f64>,
    #[serde(default)]
    context: String,
}

#[derive(Deserialize)]
struct CreateBloodSugarRequest {
    user_id: i64,
    measure_date: String,
    measure_time: Option<String>,
    blood_sugar: f64,
    #[serde(default)]
    context: String,
}

#[derive(Deserialize)]
struct UserRangeQuery {
    user_id: i64,
    start: Option<String>,
    end: Option<String>,
}

#[derive(Deserialize)]
struct UserQuery {
    user_id: i64,
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(err) => {
                tracing::error!("Internal server error: {err:#}");
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

impl From<SnapshotError> for ApiError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::InvalidRange(e) => Self::BadRequest(format!("{e}")),
            SnapshotError::UnknownUser(id) => Self::NotFound(format!("User {id} not found")),
            other => Self::Internal(other.into()),
        }
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err}"))
}

fn parse_day(s: &str, field: &str) -> Result<NaiveDate, ApiError> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid {field} '{s}'. Use YYYY-MM-DD")))?;
    validate_calendar_date(date).map_err(|e| bad_request(&e))?;
    Ok(date)
}

fn parse_day_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<(NaiveDate, NaiveDate)>, ApiError> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => {
            let start = parse_day(start, "start date")?;
            let end = parse_day(end, "end date")?;
            if end < start {
                return Err(ApiError::BadRequest(format!(
                    "End date {end} is before start date {start}"
                )));
            }
            Ok(Some((start, end)))
        }
        _ => Err(ApiError::BadRequest(
            "Both start and end are required".to_string(),
        )),
    }
}

fn require_day_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(NaiveDate, NaiveDate), ApiError> {
    parse_day_range(start, end)?
        .ok_or_else(|| ApiError::BadRequest("Both start and end are required".to_string()))
}

fn require_user(svc: &SugarService, user_id: i64) -> Result<User, ApiError> {
    svc.get_user(user_id)
        .context("database error")?
        .ok_or_else(|| ApiError::NotFound(format!("User {user_id} not found")))
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

// --- Users ---

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let email = validate_email(&req.email).map_err(|e| bad_request(&e))?;

    let svc = state.svc();
    if svc
        .get_user_by_email(&email)
        .context("database error")?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "A user with email {email} already exists"
        )));
    }
    let user = svc
        .register_user(&email, req.full_name)
        .context("failed to register user")?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let svc = state.svc();
    Ok(Json(require_user(&svc, id)?))
}

// --- Consumption ---

async fn create_consumption(
    State(state): State<AppState>,
    Json(req): Json<CreateConsumptionRequest>,
) -> Result<(StatusCode, Json<ConsumptionRecord>), ApiError> {
    let date_time = DateTime::parse_from_rfc3339(&req.date_time).map_err(|_| {
        ApiError::BadRequest(format!(
            "Invalid date_time '{}'. Use RFC 3339, e.g. 2025-03-01T08:00:00+00:00",
            req.date_time
        ))
    })?;
    validate_sugar_grams(req.sugar_grams).map_err(|e| bad_request(&e))?;
    validate_amount(req.amount).map_err(|e| bad_request(&e))?;
    if req.category.trim().is_empty() {
        return Err(ApiError::BadRequest("type must not be empty".to_string()));
    }

    let svc = state.svc();
    require_user(&svc, req.user_id)?;
    let entry = svc
        .log_consumption(
            req.user_id,
            ConsumptionInput {
                date_time,
                category: req.category,
                amount: req.amount,
                sugar_grams: req.sugar_grams,
                context: req.context,
            },
        )
        .context("failed to insert consumption")?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_consumptions(
    State(state): State<AppState>,
    Query(params): Query<UserRangeQuery>,
) -> Result<Json<Vec<ConsumptionRecord>>, ApiError> {
    let days = parse_day_range(params.start.as_deref(), params.end.as_deref())?;
    let svc = state.svc();
    require_user(&svc, params.user_id)?;
    let records = svc
        .list_consumptions(params.user_id, days)
        .context("database error")?;
    Ok(Json(records))
}

async fn get_consumption(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ConsumptionRecord>, ApiError> {
    let svc = state.svc();
    let entry = svc
        .get_consumption(id)
        .context("database error")?
        .ok_or_else(|| ApiError::NotFound(format!("Consumption {id} not found")))?;
    Ok(Json(entry))
}

// --- Blood sugar ---

async fn create_blood_sugar(
    State(state): State<AppState>,
    Json(req): Json<CreateBloodSugarRequest>,
) -> Result<(StatusCode, Json<BloodSugarMetric>), ApiError> {
    let measure_date = parse_day(&req.measure_date, "measure_date")?;
    let measure_time = req
        .measure_time
        .as_deref()
        .map(parse_time)
        .transpose()
        .map_err(|e| bad_request(&e))?;
    validate_blood_sugar(req.blood_sugar).map_err(|e| bad_request(&e))?;

    let svc = state.svc();
    require_user(&svc, req.user_id)?;
    let metric = svc
        .log_blood_sugar(
            req.user_id,
            measure_date,
            measure_time,
            req.blood_sugar,
            &req.context,
        )
        .context("failed to insert blood sugar reading")?;
    Ok((StatusCode::CREATED, Json(metric)))
}

async fn list_blood_sugar(
    State(state): State<AppState>,
    Query(params): Query<UserRangeQuery>,
) -> Result<Json<Vec<BloodSugarMetric>>, ApiError> {
    let days = parse_day_range(params.start.as_deref(), params.end.as_deref())?;
    let svc = state.svc();
    require_user(&svc, params.user_id)?;
    let metrics = svc
        .list_blood_sugar(params.user_id, days)
        .context("database error")?;
    Ok(Json(metrics))
}

// --- Charts / graphs ---

async fn create_chart(
    State(state): State<AppState>,
    Path(granularity): Path<String>,
    Query(params): Query<UserRangeQuery>,
) -> Result<(StatusCode, Json<ChartSnapshot>), ApiError> {
    let granularity: Granularity = granularity
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let (start, end) = require_day_range(params.start.as_deref(), params.end.as_deref())?;

    let svc = state.svc();
    require_user(&svc, params.user_id)?;
    let graph = svc.build_chart(params.user_id, granularity, start, end)?;
    tracing::info!(
        id = graph.id,
        user_id = graph.user_id,
        %granularity,
        %start,
        %end,
        "created graph"
    );
    Ok((StatusCode::CREATED, Json(graph)))
}

async fn list_graphs(
    State(state): State<AppState>,
    Query(params): Query<UserQuery>,
) -> Result<Json<Vec<ChartSnapshot>>, ApiError> {
    let svc = state.svc();
    require_user(&svc, params.user_id)?;
    let graphs = svc
        .list_graphs(params.user_id)
        .context("database error")?;
    Ok(Json(graphs))
}

async fn get_graph(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ChartSnapshot>, ApiError> {
    let svc = state.svc();
    let graph = svc
        .get_graph(id)
        .context("database error")?
        .ok_or_else(|| ApiError::NotFound(format!("Graph {id} not found")))?;
    Ok(Json(graph))
}

// --- Statistics ---

async fn get_sugar_summary(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<DateQuery>,
) -> Result<Json<SugarSummary>, ApiError> {
    let date = params
        .date
        .as_deref()
        .map(|d| parse_day(d, "date"))
        .transpose()?;

    let svc = state.svc();
    require_user(&svc, user_id)?;
    let date = date.unwrap_or_else(|| Utc::now().with_timezone(&svc.offset()).date_naive());
    let summary = svc
        .sugar_summary(user_id, date)
        .context("failed to build sugar summary")?;
    Ok(Json(summary))
}

async fn get_blood_sugar_variability(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<BloodSugarVariability>, ApiError> {
    let (start, end) = require_day_range(params.start.as_deref(), params.end.as_deref())?;

    let svc = state.svc();
    require_user(&svc, user_id)?;
    let variability = svc
        .blood_sugar_variability(user_id, start, end)
        .context("failed to compute blood sugar variability")?;
    Ok(Json(variability))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/users", post(create_user))
        .route("/api/users/{id}", get(get_user))
        .route(
            "/api/consumptions",
            post(create_consumption).get(list_consumptions),
        )
        .route("/api/consumptions/{id}", get(get_consumption))
        .route(
            "/api/bloodsugar",
            post(create_blood_sugar).get(list_blood_sugar),
        )
        .route("/api/charts/{granularity}", post(create_chart))
        .route("/api/graphs", get(list_graphs))
        .route("/api/graphs/{id}", get(get_graph))
        .route("/api/stats/{user_id}", get(get_sugar_summary))
        .route(
            "/api/stats/{user_id}/blood-sugar",
            get(get_blood_sugar_variability),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: SugarService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    new_api_key: bool,
) -> anyhow::Result<()> {
    let offset = svc.offset();
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    match api_key {
        Some(ref key) if !new_api_key => eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            key.get(..4).unwrap_or_default(),
            key.get(key.len().saturating_sub(4)..).unwrap_or_default(),
        ),
        Some(_) => {}
        None => tracing::warn!("authentication disabled (--no-auth); API is open to anyone"),
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        tracing::warn!(
            %bind,
            "listening on a non-loopback address with no authentication"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    tracing::info!(
        auth = api_key.is_some(),
        %offset,
        "listening on http://{bind}:{port}"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
