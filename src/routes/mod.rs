pub mod categories;
pub mod movements;
pub mod reports;
pub mod stock_items;
pub mod users;

use axum::http::{header, HeaderValue, Method};
use axum::{middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AllowedOrigins;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn create_router(state: &AppState) -> Router<AppState> {
    // Everything except login needs a bearer token; role checks happen in the handlers.
    let protected = Router::new()
        .merge(users::routes())
        .merge(categories::routes())
        .merge(stock_items::routes())
        .merge(movements::routes())
        .merge(reports::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(users::open_routes())
        .merge(protected)
}

/// Full application under the `/stock21` base path.
pub fn build_app(state: AppState) -> Router {
    let api = create_router(&state)
        .route("/", get(|| async { "Stock21 API" }))
        .route("/health", get(health_check));

    Router::new()
        .nest("/stock21", api)
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => {
            let parsed: Vec<HeaderValue> = list
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        tracing::warn!(origin = %o, "Ignoring invalid allowed origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(parsed)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
