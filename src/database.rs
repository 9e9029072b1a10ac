use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::auth::password::{hash_password, MIN_PASSWORD_LEN};
use crate::config::{BootstrapAdmin, Config};
use crate::error::AppError;
use crate::models::user::Role;

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

/// Creates the first administrator when the users table is empty.
pub async fn seed_admin(pool: &PgPool, admin: &BootstrapAdmin) -> Result<bool, AppError> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(false);
    }

    if admin.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "ADMIN_PASSWORD must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let password_hash = hash_password(&admin.password)?;
    sqlx::query(
        "INSERT INTO users (email, first_name, last_name, password_hash, role)
         VALUES ($1, 'Admin', 'Stock21', $2, $3)",
    )
    .bind(&admin.email)
    .bind(password_hash)
    .bind(Role::Admin)
    .execute(pool)
    .await?;

    info!(email = %admin.email, "Bootstrap administrator created");
    Ok(true)
}
