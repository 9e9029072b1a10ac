use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::stock_item::StockKind;
use crate::services::report::{ItemTotal, Report};

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
pub struct ItemTotalResponse {
    pub stock_item_id: i64,
    pub stock_item_name: String,
    pub kind: StockKind,
    pub movement_count: i64,
    pub quantity_in: Decimal,
    pub quantity_out: Decimal,
    pub total: Decimal,
}

impl From<ItemTotal> for ItemTotalResponse {
    fn from(item: ItemTotal) -> Self {
        Self {
            stock_item_id: item.stock_item_id,
            stock_item_name: item.stock_item_name,
            kind: item.kind,
            movement_count: item.movement_count,
            quantity_in: item.quantity_in,
            quantity_out: item.quantity_out,
            total: item.total.round_dp(2),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub movement_count: i64,
    pub inflow_value: Decimal,
    pub outflow_value: Decimal,
    pub total: Decimal,
    pub items: Vec<ItemTotalResponse>,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        Self {
            start_date: report.period.start_date,
            end_date: report.period.end_date,
            movement_count: report.movement_count,
            inflow_value: report.inflow_value.round_dp(2),
            outflow_value: report.outflow_value.round_dp(2),
            total: report.total.round_dp(2),
            items: report.items.into_iter().map(ItemTotalResponse::from).collect(),
        }
    }
}
