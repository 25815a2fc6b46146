//! casita-api library - read-only plant lookup service
//!
//! Serves the canonical plant identities and federated lookups across every
//! table in the ingested snapshot.

use axum::Router;
use casita_common::db::TableStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod lookup;

use lookup::FederatedLookup;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub lookup: FederatedLookup<dyn TableStore>,
}

impl AppState {
    pub fn new(lookup: FederatedLookup<dyn TableStore>) -> Self {
        Self { lookup }
    }

    /// State over any store, without a discovery deadline
    pub fn from_store(store: Arc<dyn TableStore>) -> Self {
        Self::new(FederatedLookup::new(store))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/", get(api::banner))
        .route("/plants", get(api::list_plants))
        .route("/plants/:plant_id", get(api::get_plant))
        .route("/resolve_common_name/:name", get(api::resolve_common_name))
        .route("/full_record/:plant_id", get(api::full_record))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
