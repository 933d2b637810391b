//! REST surface of the engine, one submodule per resource.
//!
//! Every handler takes the shared state lock, calls into
//! [`ringrule_core::Engine`] and maps errors through [`ApiError`].

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod calls;
pub mod config;
pub mod error;
pub mod extract;
pub mod health;
pub mod location;
pub mod mode;
pub mod openapi;
pub mod overrides;
pub mod rules;
pub mod suggestion;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::ApiJson;

pub use openapi::{get_openapi_json, ApiDoc};

/// Build the full application.
///
/// ```text
/// GET  /health
/// GET  /swagger-ui
/// GET  /api/openapi.json
///      /api/mode        evaluate now, latest, evaluate a given snapshot
///      /api/rules       location and time rules
/// POST /api/location    location samples
/// POST /api/calls       call state
///      /api/overrides   active flags, manual override
///      /api/suggestion  advisory mode, feedback
///      /api/config      effective config, feature toggles
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/mode", mode::router())
                .nest("/rules", rules::router())
                .nest("/location", location::router())
                .nest("/calls", calls::router())
                .nest("/overrides", overrides::router())
                .nest("/suggestion", suggestion::router())
                .nest("/config", config::router()),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
