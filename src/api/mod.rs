mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;
use crate::expand::{ExpandConfig, Expander};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub expander: Expander<Database>,
}

pub fn create_router(db: Database, config: ExpandConfig) -> Router {
    let state = AppState {
        expander: Expander::with_config(db.clone(), config),
        db,
    };

    let api = Router::new()
        // Fragments
        .route(
            "/fragments",
            get(handlers::list_fragments).post(handlers::create_fragment),
        )
        .route("/fragments/import", post(handlers::import_fragment))
        .route(
            "/fragments/{id}",
            get(handlers::get_fragment)
                .put(handlers::update_fragment)
                .delete(handlers::delete_fragment),
        )
        .route("/fragments/{id}/duplicate", post(handlers::duplicate_fragment))
        // Expansion
        .route("/expand", post(handlers::expand_prompt))
        .route("/expand/check", post(handlers::check_prompt))
        // Sequential counters
        .route("/counters", get(handlers::list_counters))
        .route("/counters/reset", post(handlers::reset_counters))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
