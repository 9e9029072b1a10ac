use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::{error, instrument};

use crate::auth::permissions::Action;
use crate::dtos::category::{CategoryRequest, CategoryResponse};
use crate::error::{map_constraint_violation, AppError};
use crate::middleware::auth::AuthContext;
use crate::models::category::Category;
use crate::state::AppState;

fn validate(payload: &CategoryRequest) -> Result<(), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation("Category name is required"));
    }
    Ok(())
}

// GET /categories
#[instrument(skip(state, auth))]
pub async fn list_categories(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    auth.require(Action::ViewStock)?;

    match sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories ORDER BY name")
        .fetch_all(&state.db_pool)
        .await
    {
        Ok(categories) => Ok(Json(categories.into_iter().map(CategoryResponse::from).collect())),
        Err(e) => {
            error!(?e, "Failed to fetch categories");
            Err(e.into())
        }
    }
}

// GET /categories/{id}
#[instrument(skip(state, auth))]
pub async fn get_category(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<CategoryResponse>, AppError> {
    auth.require(Action::ViewStock)?;

    let category = sqlx::query_as::<_, Category>("SELECT id, name, description FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Category not found"))?;

    Ok(Json(CategoryResponse::from(category)))
}

// POST /categories
#[instrument(skip(state, auth, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), AppError> {
    auth.require(Action::ManageStock)?;
    validate(&payload)?;

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, description) VALUES ($1, $2)
         RETURNING id, name, description",
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .fetch_one(&state.db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "The category already exists"))?;

    Ok((StatusCode::CREATED, Json(CategoryResponse::from(category))))
}

// PUT /categories/{id}
#[instrument(skip(state, auth, payload))]
pub async fn update_category(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    auth.require(Action::ManageStock)?;
    validate(&payload)?;

    let category = sqlx::query_as::<_, Category>(
        "UPDATE categories SET name = $1, description = $2 WHERE id = $3
         RETURNING id, name, description",
    )
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(id)
    .fetch_optional(&state.db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "The category already exists"))?
    .ok_or_else(|| AppError::not_found("Category not found"))?;

    Ok(Json(CategoryResponse::from(category)))
}

// DELETE /categories/{id} - items in the category are kept, uncategorized
#[instrument(skip(state, auth))]
pub async fn delete_category(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, AppError> {
    auth.require(Action::ManageStock)?;

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Category not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
