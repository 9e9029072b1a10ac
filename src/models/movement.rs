use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

pub const MOVEMENT_COLUMNS: &str = "id, stock_item_id, user_id, delta, unit_price, note, reverses_id, \
                                    occurred_at, created_at";

/// One ledger entry. Rows are inserted, never updated.
#[derive(Debug, Clone, FromRow)]
pub struct Movement {
    pub id: i64,
    pub stock_item_id: i64,
    pub user_id: i64,
    pub delta: Decimal,
    pub unit_price: Decimal,
    pub note: Option<String>,
    pub reverses_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Signed value of the entry: `delta * unit_price`.
    pub fn value(&self) -> Decimal {
        self.delta * self.unit_price
    }
}

/// Movement joined with the names shown in listings.
#[derive(Debug, Clone, FromRow)]
pub struct MovementDetail {
    pub id: i64,
    pub stock_item_id: i64,
    pub stock_item_name: String,
    pub user_id: i64,
    pub user_name: String,
    pub delta: Decimal,
    pub unit_price: Decimal,
    pub note: Option<String>,
    pub reverses_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
