use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::auth::permissions::Action;
use crate::dtos::stock_item::{
    CreateStockItemRequest, RecipeEntryRequest, RecipeEntryResponse, RecipeResponse,
    ReplaceRecipeRequest, StockItemQuery, StockItemResponse, UpdateStockItemRequest,
};
use crate::dtos::{Page, PageQuery, PAGE_SIZE};
use crate::error::{map_constraint_violation, AppError};
use crate::middleware::auth::AuthContext;
use crate::models::stock_item::{
    round_price, round_quantity, Measure, StockItem, StockKind, STOCK_ITEM_COLUMNS,
};
use crate::services::ledger::fetch_recipe;
use crate::state::AppState;

fn non_negative(value: Option<Decimal>, field: &str) -> Result<(), AppError> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => {
            Err(AppError::validation(format!("{field} cannot be negative")))
        }
        _ => Ok(()),
    }
}

fn validate_recipe(product_id: i64, entries: &[RecipeEntryRequest]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.ingredient_id == product_id {
            return Err(AppError::validation("A product cannot be its own ingredient"));
        }
        if round_quantity(entry.quantity) <= Decimal::ZERO {
            return Err(AppError::validation(format!(
                "Enter a quantity greater than 0 for ingredient {}",
                entry.ingredient_id
            )));
        }
        if !seen.insert(entry.ingredient_id) {
            return Err(AppError::validation(format!(
                "Ingredient {} is listed more than once",
                entry.ingredient_id
            )));
        }
    }
    Ok(())
}

/// Quantities, recipes and past movements are all expressed in the item's measure,
/// so the measure is fixed once any of them exist.
fn check_measure_change(
    item: &StockItem,
    requested: Measure,
    has_movements: bool,
    in_recipes: bool,
) -> Result<(), AppError> {
    if requested == item.measure {
        return Ok(());
    }
    if !item.quantity.is_zero() || has_movements || in_recipes {
        return Err(AppError::conflict(format!(
            "Cannot change the measure of {} from {} to {} once it has stock, movements or recipes",
            item.name,
            item.measure.as_str(),
            requested.as_str()
        )));
    }
    Ok(())
}

// GET /stock-items
#[instrument(skip(state, auth))]
pub async fn list_stock_items(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<StockItemQuery>,
) -> Result<Json<Page<StockItemResponse>>, AppError> {
    auth.require(Action::ViewStock)?;
    let page = PageQuery { page: params.page };

    const FILTER: &str = "($1::stock_kind IS NULL OR kind = $1) AND (NOT $2 OR quantity <= min_quantity)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM stock_items WHERE {FILTER}"))
        .bind(params.kind)
        .bind(params.low_stock)
        .fetch_one(&state.db_pool)
        .await?;

    let items = sqlx::query_as::<_, StockItem>(&format!(
        "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items WHERE {FILTER}
         ORDER BY name LIMIT $3 OFFSET $4"
    ))
    .bind(params.kind)
    .bind(params.low_stock)
    .bind(PAGE_SIZE)
    .bind(page.offset())
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(Page::new(
        items.into_iter().map(StockItemResponse::from).collect(),
        page.page(),
        total,
    )))
}

// GET /stock-items/{id}
#[instrument(skip(state, auth))]
pub async fn get_stock_item(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<StockItemResponse>, AppError> {
    auth.require(Action::ViewStock)?;
    let item = fetch_stock_item(&state.db_pool, id).await?;
    Ok(Json(StockItemResponse::from(item)))
}

// POST /stock-items
#[instrument(skip(state, auth, payload))]
pub async fn create_stock_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateStockItemRequest>,
) -> Result<(StatusCode, Json<StockItemResponse>), AppError> {
    auth.require(Action::ManageStock)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Stock item name is required"));
    }
    non_negative(payload.quantity, "Quantity")?;
    non_negative(payload.min_quantity, "Minimum quantity")?;
    non_negative(Some(payload.unit_cost), "Unit cost")?;

    let item = sqlx::query_as::<_, StockItem>(&format!(
        "INSERT INTO stock_items (name, kind, category_id, measure, quantity, min_quantity, unit_cost)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {STOCK_ITEM_COLUMNS}"
    ))
    .bind(payload.name.trim())
    .bind(payload.kind)
    .bind(payload.category_id)
    .bind(payload.measure.unwrap_or(Measure::Unit))
    .bind(round_quantity(payload.quantity.unwrap_or(Decimal::ZERO)))
    .bind(round_quantity(payload.min_quantity.unwrap_or(Decimal::ZERO)))
    .bind(round_price(payload.unit_cost))
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "Stock item name already exists or category does not exist"))?;

    info!(stock_item_id = item.id, created_by = auth.user_id, "Stock item created");
    Ok((StatusCode::CREATED, Json(StockItemResponse::from(item))))
}

// PUT /stock-items/{id}
#[instrument(skip(state, auth, payload))]
pub async fn update_stock_item(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<UpdateStockItemRequest>,
) -> Result<Json<StockItemResponse>, AppError> {
    auth.require(Action::ManageStock)?;

    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::validation("Stock item name cannot be empty"));
    }
    non_negative(payload.min_quantity, "Minimum quantity")?;
    non_negative(payload.unit_cost, "Unit cost")?;

    let mut tx = state.db_pool.begin().await?;

    let current = sqlx::query_as::<_, StockItem>(&format!(
        "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Stock item not found"))?;

    if let Some(measure) = payload.measure.filter(|m| *m != current.measure) {
        let (has_movements, in_recipes) = sqlx::query_as::<_, (bool, bool)>(
            "SELECT EXISTS (SELECT 1 FROM movements WHERE stock_item_id = $1),
                    EXISTS (SELECT 1 FROM recipe_entries WHERE ingredient_id = $1 OR product_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        check_measure_change(&current, measure, has_movements, in_recipes)?;
    }

    let item = sqlx::query_as::<_, StockItem>(&format!(
        "UPDATE stock_items SET
         name = COALESCE($1, name),
         category_id = CASE WHEN $2 THEN $3 ELSE category_id END,
         measure = COALESCE($4, measure),
         min_quantity = COALESCE($5, min_quantity),
         unit_cost = COALESCE($6, unit_cost),
         updated_at = NOW()
         WHERE id = $7
         RETURNING {STOCK_ITEM_COLUMNS}"
    ))
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.category_id.is_some())
    .bind(payload.category_id.flatten())
    .bind(payload.measure)
    .bind(payload.min_quantity.map(round_quantity))
    .bind(payload.unit_cost.map(round_price))
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_constraint_violation(e, "Stock item name already exists or category does not exist"))?;

    tx.commit().await?;

    Ok(Json(StockItemResponse::from(item)))
}

// DELETE /stock-items/{id}
#[instrument(skip(state, auth))]
pub async fn delete_stock_item(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, AppError> {
    auth.require(Action::ManageStock)?;

    let result = sqlx::query("DELETE FROM stock_items WHERE id = $1")
        .bind(id)
        .execute(&state.db_pool)
        .await
        .map_err(|e| {
            map_constraint_violation(e, "Stock item has ledger entries or is used in a recipe")
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Stock item not found"));
    }

    info!(stock_item_id = id, deleted_by = auth.user_id, "Stock item deleted");
    Ok(StatusCode::NO_CONTENT)
}

// GET /stock-items/{id}/recipe
#[instrument(skip(state, auth))]
pub async fn get_recipe(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<RecipeResponse>, AppError> {
    auth.require(Action::ViewStock)?;

    let mut tx = state.db_pool.begin().await?;
    let product = fetch_stock_item(&mut *tx, id).await?;
    if product.kind != StockKind::Product {
        return Err(AppError::validation(format!("{} is not a product", product.name)));
    }
    let recipe = fetch_recipe(&mut tx, id).await?;
    tx.commit().await?;

    Ok(Json(RecipeResponse {
        product_id: id,
        ingredients: recipe.into_iter().map(RecipeEntryResponse::from).collect(),
    }))
}

// PUT /stock-items/{id}/recipe - replaces the whole ingredient list
#[instrument(skip(state, auth, payload))]
pub async fn replace_recipe(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<ReplaceRecipeRequest>,
) -> Result<Json<RecipeResponse>, AppError> {
    auth.require(Action::ManageStock)?;
    validate_recipe(id, &payload.ingredients)?;

    let mut tx = state.db_pool.begin().await?;

    let product = fetch_stock_item(&mut *tx, id).await?;
    if product.kind != StockKind::Product {
        return Err(AppError::validation(format!("{} is not a product", product.name)));
    }

    let ids: Vec<i64> = payload.ingredients.iter().map(|e| e.ingredient_id).collect();
    let kinds: HashMap<i64, StockKind> = sqlx::query_as::<_, (i64, StockKind)>(
        "SELECT id, kind FROM stock_items WHERE id = ANY($1)",
    )
    .bind(ids.as_slice())
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    for ingredient_id in &ids {
        match kinds.get(ingredient_id) {
            None => return Err(AppError::not_found(format!("Ingredient {ingredient_id} not found"))),
            Some(StockKind::Product) => {
                return Err(AppError::validation(format!(
                    "Stock item {ingredient_id} is a product, not an ingredient"
                )))
            }
            Some(StockKind::Ingredient) => {}
        }
    }

    sqlx::query("DELETE FROM recipe_entries WHERE product_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    for entry in &payload.ingredients {
        sqlx::query("INSERT INTO recipe_entries (product_id, ingredient_id, quantity) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(entry.ingredient_id)
            .bind(round_quantity(entry.quantity))
            .execute(&mut *tx)
            .await?;
    }

    let recipe = fetch_recipe(&mut tx, id).await?;
    tx.commit().await?;

    info!(product_id = id, ingredients = recipe.len(), "Recipe replaced");
    Ok(Json(RecipeResponse {
        product_id: id,
        ingredients: recipe.into_iter().map(RecipeEntryResponse::from).collect(),
    }))
}

async fn fetch_stock_item<'e, E>(executor: E, id: i64) -> Result<StockItem, AppError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query_as::<_, StockItem>(&format!(
        "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::not_found("Stock item not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ingredient_id: i64, quantity: Decimal) -> RecipeEntryRequest {
        RecipeEntryRequest { ingredient_id, quantity }
    }

    #[test]
    fn recipe_rejects_duplicates_self_reference_and_zero_quantities() {
        assert!(validate_recipe(10, &[entry(1, Decimal::ONE), entry(2, Decimal::new(5, 1))]).is_ok());
        assert!(validate_recipe(10, &[entry(1, Decimal::ONE), entry(1, Decimal::ONE)]).is_err());
        assert!(validate_recipe(10, &[entry(10, Decimal::ONE)]).is_err());
        assert!(validate_recipe(10, &[entry(1, Decimal::ZERO)]).is_err());
    }

    fn flour(quantity: Decimal) -> StockItem {
        StockItem {
            id: 1,
            name: "Flour".into(),
            kind: StockKind::Ingredient,
            category_id: None,
            measure: Measure::Kg,
            quantity,
            min_quantity: Decimal::ZERO,
            unit_cost: Decimal::new(4, 0),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn measure_is_fixed_once_the_item_is_in_use() {
        let empty = flour(Decimal::ZERO);
        assert!(check_measure_change(&empty, Measure::G, false, false).is_ok());
        assert!(check_measure_change(&empty, Measure::Kg, true, true).is_ok());

        let stocked = flour(Decimal::new(5, 0));
        assert!(matches!(
            check_measure_change(&stocked, Measure::G, false, false),
            Err(AppError::Conflict(_))
        ));
        assert!(check_measure_change(&empty, Measure::Unit, true, false).is_err());
        assert!(check_measure_change(&empty, Measure::G, false, true).is_err());
    }

    #[test]
    fn quantities_below_the_stored_scale_do_not_make_a_recipe() {
        assert!(validate_recipe(10, &[entry(1, Decimal::new(4, 4))]).is_err());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(non_negative(Some(Decimal::new(-1, 0)), "Unit cost").is_err());
        assert!(non_negative(Some(Decimal::ZERO), "Unit cost").is_ok());
        assert!(non_negative(None, "Unit cost").is_ok());
    }
}
