use axum::middleware;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod handler;

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/cpu", get(handler::cpu))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ));

    Router::new().route("/", get(handler::health)).merge(protected)
}
