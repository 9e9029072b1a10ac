use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::{info, instrument};

use crate::auth::jwt::sign_token;
use crate::auth::password::{hash_password, validate_new_password, verify_password};
use crate::auth::permissions::Action;
use crate::dtos::user::{CreateUserRequest, LoginRequest, LoginResponse, UpdateUserRequest, UserResponse};
use crate::dtos::{Page, PageQuery, PAGE_SIZE};
use crate::error::{map_constraint_violation, AppError};
use crate::middleware::auth::AuthContext;
use crate::models::user::User;
use crate::state::AppState;

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, password_hash, role, is_active, created_at, updated_at";

fn validate_profile(email: &str, first_name: &str, last_name: &str) -> Result<(), AppError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("A valid email is required"));
    }
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        return Err(AppError::validation("First and last name are required"));
    }
    Ok(())
}

fn password_errors(errors: Vec<String>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(errors.join(" ")))
    }
}

#[instrument(skip(db_pool, config, payload), fields(email = %payload.email))]
pub async fn login_user(
    State(AppState { db_pool, config }): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() {
        return Err(AppError::validation("Email required"));
    }
    if payload.password.is_empty() {
        return Err(AppError::validation("Password required"));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
    ))
    .bind(payload.email.trim())
    .fetch_optional(&db_pool)
    .await?;

    // Unknown, disabled and wrong-password logins are indistinguishable to the caller.
    let user = match user {
        Some(u) if u.is_active && verify_password(&payload.password, &u.password_hash)? => u,
        _ => {
            info!("Rejected login");
            return Err(AppError::unauthenticated("Invalid credentials"));
        }
    };

    let token = sign_token(
        user.id,
        user.role,
        &user.display_name(),
        &config.jwt_secret,
        config.token_ttl_hours,
    )?;

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "Bearer",
        expires_in_seconds: config.token_ttl_hours * 60 * 60,
    }))
}

// Authenticated endpoint: returns full user profile from DB using the id in AuthContext
pub async fn get_me(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    let user = fetch_user(&db_pool, auth.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

#[instrument(skip(db_pool, auth))]
pub async fn list_users(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<UserResponse>>, AppError> {
    auth.require(Action::ManageUsers)?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&db_pool)
        .await?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY first_name, last_name, id LIMIT $1 OFFSET $2"
    ))
    .bind(PAGE_SIZE)
    .bind(page.offset())
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(Page::new(
        users.into_iter().map(UserResponse::from).collect(),
        page.page(),
        total,
    )))
}

#[instrument(skip(db_pool, auth, payload))]
pub async fn create_user(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    auth.require(Action::ManageUsers)?;
    validate_profile(&payload.email, &payload.first_name, &payload.last_name)?;
    password_errors(validate_new_password(&payload.password, &payload.confirm_password))?;

    let password_hash = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, first_name, last_name, password_hash, role)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(payload.email.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(password_hash)
    .bind(payload.role)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "An account with this email already exists"))?;

    info!(user_id = user.id, role = user.role.as_str(), created_by = auth.user_id, "User created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[instrument(skip(db_pool, auth, payload))]
pub async fn update_user(
    Path(id): Path<i64>,
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    auth.require(Action::ManageUsers)?;
    validate_profile(&payload.email, &payload.first_name, &payload.last_name)?;

    // Password changes only when both fields are filled in.
    let password_hash = match (payload.password.as_deref(), payload.confirm_password.as_deref()) {
        (Some(p), Some(c)) if !p.is_empty() && !c.is_empty() => {
            password_errors(validate_new_password(p, c))?;
            Some(hash_password(p)?)
        }
        _ => None,
    };

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
         email = $1,
         first_name = $2,
         last_name = $3,
         role = $4,
         password_hash = COALESCE($5, password_hash),
         updated_at = NOW()
         WHERE id = $6
         RETURNING {USER_COLUMNS}"
    ))
    .bind(payload.email.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.role)
    .bind(password_hash)
    .bind(id)
    .fetch_optional(&db_pool)
    .await
    .map_err(|e| map_constraint_violation(e, "An account with this email already exists"))?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    info!(user_id = id, updated_by = auth.user_id, "User updated");
    Ok(Json(UserResponse::from(user)))
}

/// Soft delete: the account stays for the ledger but can no longer log in or act.
#[instrument(skip(db_pool, auth))]
pub async fn disable_user(
    Path(id): Path<i64>,
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<UserResponse>, AppError> {
    auth.require(Action::ManageUsers)?;
    if id == auth.user_id {
        return Err(AppError::validation("You cannot disable your own account"));
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    info!(user_id = id, disabled_by = auth.user_id, "User disabled");
    Ok(Json(UserResponse::from(user)))
}

async fn fetch_user(db_pool: &sqlx::PgPool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_requires_email_and_names() {
        assert!(validate_profile("ana@pizza.test", "Ana", "Souza").is_ok());
        assert!(validate_profile("not-an-email", "Ana", "Souza").is_err());
        assert!(validate_profile("ana@pizza.test", " ", "Souza").is_err());
    }

    #[test]
    fn password_errors_are_joined() {
        let err = password_errors(vec!["one.".into(), "two.".into()]).unwrap_err();
        assert_eq!(err.to_string(), "one. two.");
        assert!(password_errors(Vec::new()).is_ok());
    }
}
