use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::modules::health::handler::index;
use crate::state::AppState;

pub fn configure_routes(state: AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Anything not matched by the API is looked up in the browser client's directory.
    let client = ServeDir::new(&state.config.public_dir);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api", get(index))
        .nest("/api/auth", crate::modules::auth::router())
        .nest("/api/videos", crate::modules::video::router(state.clone()))
        .nest("/api/health", crate::modules::health::router(state))
        .fallback_service(client)
        .layer(cors)
}
