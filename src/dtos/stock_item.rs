use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::stock_item::{Measure, RecipeEntry, StockItem, StockKind};

#[derive(Debug, Deserialize)]
pub struct CreateStockItemRequest {
    pub name: String,
    pub kind: StockKind,
    pub category_id: Option<i64>,
    pub measure: Option<Measure>,
    pub quantity: Option<Decimal>,
    pub min_quantity: Option<Decimal>,
    pub unit_cost: Decimal,
}

/// Quantity is absent on purpose: it only changes through movements.
#[derive(Debug, Deserialize)]
pub struct UpdateStockItemRequest {
    pub name: Option<String>,
    /// `None` leaves the category alone, `Some(None)` clears it.
    #[serde(default, deserialize_with = "present")]
    pub category_id: Option<Option<i64>>,
    pub measure: Option<Measure>,
    pub min_quantity: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
}

/// Marks a field that was sent, even as `null`; missing fields fall back to `default`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct StockItemQuery {
    pub kind: Option<StockKind>,
    #[serde(default)]
    pub low_stock: bool,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StockItemResponse {
    pub id: i64,
    pub name: String,
    pub kind: StockKind,
    pub category_id: Option<i64>,
    pub measure: Measure,
    pub quantity: Decimal,
    pub min_quantity: Decimal,
    pub unit_cost: Decimal,
    pub low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StockItem> for StockItemResponse {
    fn from(item: StockItem) -> Self {
        Self {
            low_stock: item.is_low(),
            id: item.id,
            name: item.name,
            kind: item.kind,
            category_id: item.category_id,
            measure: item.measure,
            quantity: item.quantity,
            min_quantity: item.min_quantity,
            unit_cost: item.unit_cost,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecipeEntryRequest {
    pub ingredient_id: i64,
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRecipeRequest {
    pub ingredients: Vec<RecipeEntryRequest>,
}

#[derive(Debug, Serialize)]
pub struct RecipeEntryResponse {
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub measure: Measure,
    pub quantity: Decimal,
}

impl From<RecipeEntry> for RecipeEntryResponse {
    fn from(entry: RecipeEntry) -> Self {
        Self {
            ingredient_id: entry.ingredient_id,
            ingredient_name: entry.ingredient_name,
            measure: entry.measure,
            quantity: entry.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub product_id: i64,
    pub ingredients: Vec<RecipeEntryResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_can_be_kept_set_or_cleared() {
        let kept: UpdateStockItemRequest = serde_json::from_str(r#"{"name":"Flour 00"}"#).unwrap();
        assert_eq!(kept.category_id, None);

        let set: UpdateStockItemRequest = serde_json::from_str(r#"{"category_id":4}"#).unwrap();
        assert_eq!(set.category_id, Some(Some(4)));

        let cleared: UpdateStockItemRequest = serde_json::from_str(r#"{"category_id":null}"#).unwrap();
        assert_eq!(cleared.category_id, Some(None));
    }
}
