//! Canonical plant identities

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use casita_common::model::PlantRecord;
use serde_json::json;

use crate::lookup::LookupError;
use crate::AppState;

/// GET /plants
pub async fn list_plants(State(state): State<AppState>) -> Result<Json<Vec<PlantRecord>>, LookupError> {
    Ok(Json(state.lookup.list_plants().await?))
}

/// GET /plants/:plant_id
///
/// 404 when the identifier is not in the canonical table.
pub async fn get_plant(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
) -> Result<Response, LookupError> {
    match state.lookup.get_plant(&plant_id).await? {
        Some(plant) => Ok(Json(plant).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Plant not found" })),
        )
            .into_response()),
    }
}
