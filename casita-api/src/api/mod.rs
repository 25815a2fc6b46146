//! HTTP API handlers for casita-api

pub mod health;
pub mod lookup;
pub mod plants;

pub use health::{banner, health_routes};
pub use lookup::{full_record, resolve_common_name};
pub use plants::{get_plant, list_plants};

use crate::lookup::LookupError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let status = match &self {
            LookupError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LookupError::Discovery(_)
            | LookupError::DiscoveryTimeout(_)
            | LookupError::Canonical(_) => {
                error!("Lookup failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
