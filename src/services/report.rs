//! Billing reports: read-only aggregation of the movement ledger over a date period.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use crate::error::AppError;
use crate::models::stock_item::StockKind;

/// Inclusive calendar-day period, interpreted in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ReportPeriod {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, max_days: i64) -> Result<Self, AppError> {
        if start_date > end_date {
            return Err(AppError::validation("The period cannot be negative"));
        }
        let span = (end_date - start_date).num_days() + 1;
        if span > max_days {
            return Err(AppError::validation(format!(
                "The maximum consultation period is {max_days} days"
            )));
        }
        Ok(Self { start_date, end_date })
    }

    pub fn parse(start: &str, end: &str, max_days: i64) -> Result<Self, AppError> {
        let parse = |raw: &str| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| AppError::validation("Insert a valid date (YYYY-MM-DD)"))
        };
        Self::new(parse(start)?, parse(end)?, max_days)
    }

    /// Half-open timestamp range `[start 00:00, day after end 00:00)`.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = self
            .end_date
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end_date)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        (start, end)
    }
}

/// One movement, as the report needs it.
#[derive(Debug, Clone, FromRow)]
pub struct ReportLine {
    pub stock_item_id: i64,
    pub stock_item_name: String,
    pub kind: StockKind,
    pub delta: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemTotal {
    pub stock_item_id: i64,
    pub stock_item_name: String,
    pub kind: StockKind,
    pub movement_count: i64,
    pub quantity_in: Decimal,
    pub quantity_out: Decimal,
    /// Signed sum of `delta * unit_price`.
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub period: ReportPeriod,
    pub items: Vec<ItemTotal>,
    pub movement_count: i64,
    pub inflow_value: Decimal,
    pub outflow_value: Decimal,
    pub total: Decimal,
}

impl Report {
    pub fn build(period: ReportPeriod, lines: impl IntoIterator<Item = ReportLine>) -> Self {
        let mut by_item: BTreeMap<i64, ItemTotal> = BTreeMap::new();
        let mut inflow_value = Decimal::ZERO;
        let mut outflow_value = Decimal::ZERO;
        let mut movement_count = 0;

        for line in lines {
            let value = line.delta * line.unit_price;
            let entry = by_item.entry(line.stock_item_id).or_insert_with(|| ItemTotal {
                stock_item_id: line.stock_item_id,
                stock_item_name: line.stock_item_name.clone(),
                kind: line.kind,
                movement_count: 0,
                quantity_in: Decimal::ZERO,
                quantity_out: Decimal::ZERO,
                total: Decimal::ZERO,
            });

            entry.movement_count += 1;
            entry.total += value;
            if line.delta.is_sign_positive() {
                entry.quantity_in += line.delta;
                inflow_value += value;
            } else {
                entry.quantity_out -= line.delta;
                outflow_value -= value;
            }
            movement_count += 1;
        }

        let items: Vec<ItemTotal> = by_item.into_values().collect();
        let total = items.iter().map(|i| i.total).sum();

        Self {
            period,
            items,
            movement_count,
            inflow_value,
            outflow_value,
            total,
        }
    }
}

#[instrument(skip(pool))]
pub async fn generate_report(pool: &PgPool, period: ReportPeriod) -> Result<Report, AppError> {
    let (start, end) = period.bounds();

    let lines = sqlx::query_as::<_, ReportLine>(
        "SELECT m.stock_item_id, s.name AS stock_item_name, s.kind, m.delta, m.unit_price
         FROM movements m
         JOIN stock_items s ON s.id = m.stock_item_id
         WHERE m.occurred_at >= $1 AND m.occurred_at < $2
         ORDER BY m.occurred_at, m.id",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(Report::build(period, lines))
}
