//! Federated lookups across every discovered table

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::lookup::{FullRecord, LookupError};
use crate::AppState;

/// GET /resolve_common_name/:name
///
/// 200 with matches, or 404 `{"message", "failed_sources"}` when no table
/// matched. Tables that failed are listed either way.
pub async fn resolve_common_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, LookupError> {
    let resolution = state.lookup.resolve_by_common_name(&name).await?;

    if resolution.is_not_found() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "message": format!("No match for '{}'", resolution.query),
                "failed_sources": resolution.failed_sources,
            })),
        )
            .into_response());
    }
    Ok(Json(resolution).into_response())
}

/// GET /full_record/:plant_id
///
/// Always 200 unless discovery itself fails; not-found and per-table errors
/// are reported inside the sections.
pub async fn full_record(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
) -> Result<Json<FullRecord>, LookupError> {
    Ok(Json(state.lookup.get_full_record(&plant_id).await?))
}
