use axum::{routing::get, Router};
use crate::handlers::stock_item::{
    create_stock_item, delete_stock_item, get_recipe, get_stock_item, list_stock_items,
    replace_recipe, update_stock_item,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stock-items", get(list_stock_items).post(create_stock_item))
        .route("/stock-items/{id}", get(get_stock_item).put(update_stock_item).delete(delete_stock_item))
        .route("/stock-items/{id}/recipe", get(get_recipe).put(replace_recipe))
}
