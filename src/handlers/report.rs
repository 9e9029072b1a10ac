use axum::{
    extract::{Query, State},
    Extension, Json,
};
use tracing::{info, instrument};

use crate::auth::permissions::Action;
use crate::dtos::report::{ReportQuery, ReportResponse};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::services::report::{generate_report, ReportPeriod};
use crate::state::AppState;

// GET /reports?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD
#[instrument(skip(state, auth))]
pub async fn get_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<ReportResponse>, AppError> {
    auth.require(Action::ViewReports)?;

    let period = ReportPeriod::parse(&params.start_date, &params.end_date, state.config.report_max_days)?;
    let report = generate_report(&state.db_pool, period).await?;

    info!(
        start = %period.start_date,
        end = %period.end_date,
        movements = report.movement_count,
        "Report generated"
    );
    Ok(Json(ReportResponse::from(report)))
}
