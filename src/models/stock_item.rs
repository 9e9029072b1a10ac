use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "stock_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StockKind {
    Ingredient,
    Product,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "measure", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    G,
    Kg,
    Unit,
}

impl Measure {
    /// Converts `quantity` expressed in `self` into `target`.
    ///
    /// Grams and kilograms convert into each other; units only convert to units.
    pub fn convert(self, quantity: Decimal, target: Measure) -> Result<Decimal, AppError> {
        let thousand = Decimal::from(1000);
        match (self, target) {
            (from, to) if from == to => Ok(quantity),
            (Measure::G, Measure::Kg) => Ok(quantity / thousand),
            (Measure::Kg, Measure::G) => Ok(quantity * thousand),
            (from, to) => Err(AppError::validation(format!(
                "Cannot convert {} to {}",
                from.as_str(),
                to.as_str()
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Measure::G => "g",
            Measure::Kg => "kg",
            Measure::Unit => "unit",
        }
    }
}

/// Decimal places of the stored quantity columns (`NUMERIC(12, 3)`).
pub const QUANTITY_SCALE: u32 = 3;
/// Decimal places of the stored money columns (`NUMERIC(12, 2)`).
pub const PRICE_SCALE: u32 = 2;

/// Rounds to the stored quantity scale the way Postgres does (half away from zero).
pub fn round_quantity(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

pub const STOCK_ITEM_COLUMNS: &str = "id, name, kind, category_id, measure, quantity, min_quantity, \
                                      unit_cost, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct StockItem {
    pub id: i64,
    pub name: String,
    pub kind: StockKind,
    pub category_id: Option<i64>,
    pub measure: Measure,
    pub quantity: Decimal,
    pub min_quantity: Decimal,
    pub unit_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    pub fn is_low(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

/// Ingredient quantity consumed by one unit of a product, in the ingredient's measure.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeEntry {
    pub product_id: i64,
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub measure: Measure,
    pub quantity: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grams_and_kilograms_convert() {
        assert_eq!(
            Measure::G.convert(Decimal::new(1500, 0), Measure::Kg).unwrap(),
            Decimal::new(15, 1)
        );
        assert_eq!(
            Measure::Kg.convert(Decimal::new(25, 1), Measure::G).unwrap(),
            Decimal::new(2500, 0)
        );
        assert_eq!(
            Measure::Unit.convert(Decimal::new(3, 0), Measure::Unit).unwrap(),
            Decimal::new(3, 0)
        );
    }

    #[test]
    fn units_do_not_convert_to_weights() {
        let err = Measure::Unit.convert(Decimal::ONE, Measure::Kg).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn rounding_matches_the_stored_scale() {
        assert_eq!(round_quantity(Decimal::new(-5, 4)), Decimal::new(-1, 3));
        assert_eq!(round_quantity(Decimal::new(4, 4)), Decimal::ZERO);
        assert_eq!(round_quantity(Decimal::new(12344, 4)), Decimal::new(1234, 3));
        assert_eq!(round_price(Decimal::new(1005, 3)), Decimal::new(101, 2));
    }
}
