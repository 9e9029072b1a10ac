use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sqlx::PgPool;

use crate::auth::jwt::verify_token;
use crate::auth::permissions::{authorize, Action};
use crate::error::AppError;
use crate::models::user::Role;
use crate::state::AppState;

#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: Role,
    pub name: String,
}

impl AuthContext {
    /// Role gate: rejects with `Unauthorized` when the role does not permit `action`.
    pub fn require(&self, action: Action) -> Result<(), AppError> {
        if authorize(self.role, action) {
            Ok(())
        } else {
            tracing::warn!(user_id = self.user_id, role = self.role.as_str(), ?action, "Access denied");
            Err(AppError::unauthorized(format!(
                "Your role is not allowed to {}",
                action.describe()
            )))
        }
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth_header = match req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok()) {
        Some(h) => h,
        None => return AppError::unauthenticated("Missing Authorization header").into_response(),
    };

    // Expect "Bearer <token>"
    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return AppError::unauthenticated("Invalid Authorization format").into_response(),
    };

    let claims = match verify_token(token, &state.config.jwt_secret) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    // Role and status come from the users row, not from the token.
    let context = match load_context(&state.db_pool, claims.sub).await {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    req.extensions_mut().insert(context);

    next.run(req).await
}

async fn load_context(pool: &PgPool, user_id: i64) -> Result<AuthContext, AppError> {
    let row = sqlx::query_as::<_, (Role, bool, String)>(
        "SELECT role, is_active, first_name || ' ' || last_name FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some((role, true, name)) => Ok(AuthContext { user_id, role, name }),
        Some((_, false, _)) => {
            tracing::warn!(user_id, "Token presented for a disabled account");
            Err(AppError::unauthenticated("User account is disabled"))
        }
        None => Err(AppError::unauthenticated("User no longer exists")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> AuthContext {
        AuthContext { user_id: 1, role, name: "Test User".into() }
    }

    #[test]
    fn employee_is_denied_stock_management() {
        let err = ctx(Role::Employee).require(Action::ManageStock).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn admin_passes_stock_management() {
        assert!(ctx(Role::Admin).require(Action::ManageStock).is_ok());
    }
}
