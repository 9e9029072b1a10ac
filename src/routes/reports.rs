use axum::{routing::get, Router};
use crate::handlers::report::get_report;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/reports", get(get_report))
}
