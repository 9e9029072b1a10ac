use axum::{
    routing::{get, post},
    Router,
};
use crate::state::AppState;
use crate::handlers::movement;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/movements", get(movement::list_movements).post(movement::create_movement))
        .route("/movements/batch", post(movement::create_batch))
        .route("/movements/sales", post(movement::create_sale))
        .route("/movements/{id}", get(movement::get_movement))
        .route("/movements/{id}/reversal", post(movement::reverse_movement))
}
