use axum::{Router, routing::{post, get, put}};
use crate::state::AppState;
use crate::handlers::user::{login_user, get_me, list_users, create_user, update_user, disable_user};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(get_me))
        .route("/users/{id}", put(update_user).delete(disable_user))
}

pub fn open_routes() -> Router<AppState> {
    Router::new().route("/users/login", post(login_user))
}
