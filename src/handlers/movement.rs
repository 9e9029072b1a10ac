use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::auth::permissions::Action;
use crate::dtos::movement::{
    CreateBatchRequest, CreateMovementRequest, CreateSaleRequest, MovementDetailResponse,
    MovementQuery, MovementResponse,
};
use crate::dtos::{Page, PageQuery, PAGE_SIZE};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::movement::MovementDetail;
use crate::services::ledger::{self, LedgerLine};
use crate::services::report::ReportPeriod;
use crate::state::AppState;

const DETAIL_SELECT: &str = "SELECT m.id, m.stock_item_id, s.name AS stock_item_name, m.user_id,
        u.first_name || ' ' || u.last_name AS user_name,
        m.delta, m.unit_price, m.note, m.reverses_id, m.occurred_at, m.created_at
     FROM movements m
     JOIN stock_items s ON s.id = m.stock_item_id
     JOIN users u ON u.id = m.user_id";

/// Movements may be back-dated but not recorded in the future.
fn occurred_at(requested: Option<DateTime<Utc>>) -> Result<DateTime<Utc>, AppError> {
    let now = Utc::now();
    match requested {
        Some(at) if at > now => Err(AppError::validation("Movement date cannot be in the future")),
        Some(at) => Ok(at),
        None => Ok(now),
    }
}

// POST /movements
#[instrument(skip(state, auth, req))]
pub async fn create_movement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateMovementRequest>,
) -> Result<(StatusCode, Json<MovementResponse>), AppError> {
    auth.require(Action::RecordMovement)?;

    let line = LedgerLine::from(req.line);
    line.validate()?;
    let at = occurred_at(req.occurred_at)?;

    let movement = ledger::record_movement(&state.db_pool, auth.user_id, line, req.note, at).await?;

    Ok((StatusCode::CREATED, Json(MovementResponse::from(movement))))
}

// POST /movements/batch
#[instrument(skip(state, auth, req))]
pub async fn create_batch(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateBatchRequest>,
) -> Result<(StatusCode, Json<Vec<MovementResponse>>), AppError> {
    auth.require(Action::RecordMovement)?;

    let lines: Vec<LedgerLine> = req.lines.into_iter().map(LedgerLine::from).collect();
    if lines.is_empty() {
        return Err(AppError::validation("Select at least 1 stock item"));
    }
    for line in &lines {
        line.validate()?;
    }
    let at = occurred_at(req.occurred_at)?;

    let movements = ledger::record_lines(&state.db_pool, auth.user_id, lines, req.note, at).await?;

    Ok((
        StatusCode::CREATED,
        Json(movements.into_iter().map(MovementResponse::from).collect()),
    ))
}

// POST /movements/sales
#[instrument(skip(state, auth, req))]
pub async fn create_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<Vec<MovementResponse>>), AppError> {
    auth.require(Action::RecordMovement)?;

    if req.quantity <= rust_decimal::Decimal::ZERO {
        return Err(AppError::validation("Enter a quantity greater than 0"));
    }
    let at = occurred_at(req.occurred_at)?;

    let movements = ledger::record_sale(
        &state.db_pool,
        auth.user_id,
        req.product_id,
        req.quantity,
        req.note,
        at,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(movements.into_iter().map(MovementResponse::from).collect()),
    ))
}

// POST /movements/{id}/reversal
#[instrument(skip(state, auth))]
pub async fn reverse_movement(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<(StatusCode, Json<MovementResponse>), AppError> {
    auth.require(Action::ReverseMovement)?;

    let movement = ledger::reverse_movement(&state.db_pool, auth.user_id, id).await?;

    Ok((StatusCode::CREATED, Json(MovementResponse::from(movement))))
}

// GET /movements - newest first, optionally within a period
#[instrument(skip(state, auth))]
pub async fn list_movements(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<MovementQuery>,
) -> Result<Json<Page<MovementDetailResponse>>, AppError> {
    auth.require(Action::ViewMovements)?;
    let page = PageQuery { page: params.page };

    let bounds = match (params.start_date.as_deref(), params.end_date.as_deref()) {
        (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => {
            Some(ReportPeriod::parse(start, end, state.config.report_max_days)?.bounds())
        }
        _ => None,
    };
    let (start, end) = bounds.unzip();

    const FILTER: &str = "($1::timestamptz IS NULL OR m.occurred_at >= $1)
        AND ($2::timestamptz IS NULL OR m.occurred_at < $2)
        AND ($3::bigint IS NULL OR m.stock_item_id = $3)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM movements m WHERE {FILTER}"))
        .bind(start)
        .bind(end)
        .bind(params.stock_item_id)
        .fetch_one(&state.db_pool)
        .await?;

    let movements = sqlx::query_as::<_, MovementDetail>(&format!(
        "{DETAIL_SELECT} WHERE {FILTER} ORDER BY m.occurred_at DESC, m.id DESC LIMIT $4 OFFSET $5"
    ))
    .bind(start)
    .bind(end)
    .bind(params.stock_item_id)
    .bind(PAGE_SIZE)
    .bind(page.offset())
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(Page::new(
        movements.into_iter().map(MovementDetailResponse::from).collect(),
        page.page(),
        total,
    )))
}

// GET /movements/{id}
#[instrument(skip(state, auth))]
pub async fn get_movement(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<MovementDetailResponse>, AppError> {
    auth.require(Action::ViewMovements)?;

    let movement = sqlx::query_as::<_, MovementDetail>(&format!("{DETAIL_SELECT} WHERE m.id = $1"))
        .bind(id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Movement not found"))?;

    Ok(Json(MovementDetailResponse::from(movement)))
}
