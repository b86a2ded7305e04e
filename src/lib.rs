use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod expiry;
pub mod models;
pub mod tags;
pub mod time_weights;

use clock::Clock;
use config::Config;
use database::*;
use error::AppError;
use expiry::ExpiryConfig;
use models::*;
use time_weights::HeatConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub expiry_config: ExpiryConfig,
    pub heat_config: HeatConfig,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            expiry_config: config.expiry.clone(),
            heat_config: config.heat.clone(),
            clock,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/locations", get(get_locations).post(create_location))
        .route("/api/locations/{id}/checkins", post(create_checkin))
        .route("/api/locations/{id}/checkouts", post(create_checkout))
        .route("/api/admin/timeout", get(get_admin_timeout).post(set_admin_timeout))
        .route("/api/tags", get(get_tags))
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// `create_app` plus the static front-end served for any unmatched path.
pub fn create_app_with_frontend(state: AppState, config: &Config) -> Router {
    create_app(state).fallback_service(ServeDir::new(&config.static_dir))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn get_tags() -> Json<Vec<Tag>> {
    Json(Tag::ALL.to_vec())
}

async fn create_location(
    State(state): State<AppState>,
    Json(submission): Json<LocationSubmission>,
) -> Result<(StatusCode, Json<LocationView>), AppError> {
    let new_location = submission.validate()?;
    let location = insert_location(&state.db, new_location, state.clock.now()).await?;

    info!("Created location {} at ({}, {})", location.id, location.lat, location.lon);
    Ok((StatusCode::CREATED, Json(LocationView::new(location, Vec::new()))))
}

#[derive(Deserialize)]
struct LocationsQuery {
    timeout: Option<u32>,
}

async fn get_locations(
    Query(query): Query<LocationsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ScoredLocation>>, AppError> {
    let timeout_minutes = match query.timeout {
        Some(timeout) => timeout,
        None => get_timeout_setting(&state.db)
            .await?
            .unwrap_or(state.expiry_config.default_timeout_minutes),
    };

    let now = state.clock.now();
    purge_expired(&state.db, timeout_minutes, now).await?;

    let locations: Vec<ScoredLocation> = list_locations(&state.db)
        .await?
        .into_iter()
        .map(|(location, checkins)| {
            score_location(LocationView::new(location, checkins), now, &state.heat_config)
        })
        .collect();

    Ok(Json(locations))
}

async fn create_checkin(
    Path(location_id): Path<i64>,
    State(state): State<AppState>,
    Json(submission): Json<CheckinSubmission>,
) -> Result<(StatusCode, Json<CheckinRecord>), AppError> {
    record_checkin(&state, location_id, submission.validate()?).await
}

async fn create_checkout(
    Path(location_id): Path<i64>,
    State(state): State<AppState>,
    Json(submission): Json<CheckoutSubmission>,
) -> Result<(StatusCode, Json<CheckinRecord>), AppError> {
    record_checkin(&state, location_id, submission.validate()?).await
}

async fn record_checkin(
    state: &AppState,
    location_id: i64,
    checkin: NewCheckin,
) -> Result<(StatusCode, Json<CheckinRecord>), AppError> {
    let missing = format!("Location {location_id} not found");
    if !location_exists(&state.db, location_id).await? {
        return Err(AppError::NotFound(missing));
    }

    let record = insert_checkin(&state.db, location_id, checkin, state.clock.now())
        .await
        .map_err(|e| AppError::from_insert(e, "Already checked in at this location", &missing))?;

    info!("Recorded check-in {} at location {}", record.id, location_id);
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_admin_timeout(State(state): State<AppState>) -> Result<Json<TimeoutSetting>, AppError> {
    let timeout = get_timeout_setting(&state.db)
        .await?
        .unwrap_or(state.expiry_config.default_timeout_minutes);

    Ok(Json(TimeoutSetting { timeout }))
}

async fn set_admin_timeout(
    State(state): State<AppState>,
    Json(submission): Json<TimeoutSubmission>,
) -> Result<Json<serde_json::Value>, AppError> {
    let timeout = submission.validate()?;
    set_timeout_setting(&state.db, timeout).await?;

    info!("Default location timeout set to {timeout} minute(s)");
    Ok(Json(serde_json::json!({ "message": "Timeout updated successfully" })))
}
