use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::movement::{Movement, MovementDetail};
use crate::models::stock_item::Measure;
use crate::services::ledger::LedgerLine;

#[derive(Debug, Deserialize)]
pub struct MovementLineRequest {
    pub stock_item_id: i64,
    pub delta: Decimal,
    pub unit_price: Option<Decimal>,
    pub measure: Option<Measure>,
}

impl From<MovementLineRequest> for LedgerLine {
    fn from(req: MovementLineRequest) -> Self {
        LedgerLine {
            stock_item_id: req.stock_item_id,
            delta: req.delta,
            unit_price: req.unit_price,
            measure: req.measure,
            reverses_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    #[serde(flatten)]
    pub line: MovementLineRequest,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    pub lines: Vec<MovementLineRequest>,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub product_id: i64,
    pub quantity: Decimal,
    pub note: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub stock_item_id: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub id: i64,
    pub stock_item_id: i64,
    pub user_id: i64,
    pub delta: Decimal,
    pub unit_price: Decimal,
    pub value: Decimal,
    pub note: Option<String>,
    pub reverses_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<Movement> for MovementResponse {
    fn from(m: Movement) -> Self {
        Self {
            value: m.value().round_dp(2),
            id: m.id,
            stock_item_id: m.stock_item_id,
            user_id: m.user_id,
            delta: m.delta,
            unit_price: m.unit_price,
            note: m.note,
            reverses_id: m.reverses_id,
            occurred_at: m.occurred_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementDetailResponse {
    pub id: i64,
    pub stock_item_id: i64,
    pub stock_item_name: String,
    pub user_id: i64,
    pub user_name: String,
    pub delta: Decimal,
    pub unit_price: Decimal,
    pub value: Decimal,
    pub note: Option<String>,
    pub reverses_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<MovementDetail> for MovementDetailResponse {
    fn from(m: MovementDetail) -> Self {
        Self {
            value: (m.delta * m.unit_price).round_dp(2),
            id: m.id,
            stock_item_id: m.stock_item_id,
            stock_item_name: m.stock_item_name,
            user_id: m.user_id,
            user_name: m.user_name,
            delta: m.delta,
            unit_price: m.unit_price,
            note: m.note,
            reverses_id: m.reverses_id,
            occurred_at: m.occurred_at,
            created_at: m.created_at,
        }
    }
}
