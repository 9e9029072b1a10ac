//! Movement ledger.
//!
//! Every quantity change goes through [`record_lines`]: the touched stock rows are
//! locked, the new quantities are planned in memory, and the quantity updates plus
//! the movement inserts commit in one transaction. Movements are never updated or
//! deleted; corrections are recorded with [`reverse_movement`].

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument};

use crate::error::{map_constraint_violation, AppError};
use crate::models::movement::{Movement, MOVEMENT_COLUMNS};
use crate::models::stock_item::{
    round_price, round_quantity, Measure, RecipeEntry, StockItem, StockKind, STOCK_ITEM_COLUMNS,
};

/// A requested quantity change, before it is checked against stock.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerLine {
    pub stock_item_id: i64,
    pub delta: Decimal,
    /// Price per unit; the item's unit cost when absent.
    pub unit_price: Option<Decimal>,
    /// Measure `delta` is expressed in; the item's own measure when absent.
    pub measure: Option<Measure>,
    pub reverses_id: Option<i64>,
}

impl LedgerLine {
    pub fn new(stock_item_id: i64, delta: Decimal) -> Self {
        Self {
            stock_item_id,
            delta,
            unit_price: None,
            measure: None,
            reverses_id: None,
        }
    }

    pub fn at_price(mut self, unit_price: Decimal) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    pub fn in_measure(mut self, measure: Measure) -> Self {
        self.measure = Some(measure);
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.delta.is_zero() {
            return Err(AppError::validation(
                "Quantity delta cannot be 0. Use positive for inflow, negative for outflow",
            ));
        }
        if self.unit_price.is_some_and(|p| p.is_sign_negative()) {
            return Err(AppError::validation("Unit price cannot be negative"));
        }
        Ok(())
    }
}

/// A line resolved against its stock item, ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEntry {
    pub stock_item_id: i64,
    pub delta: Decimal,
    pub unit_price: Decimal,
    pub reverses_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub entries: Vec<PlannedEntry>,
    /// Final quantity of every touched item.
    pub quantities: BTreeMap<i64, Decimal>,
}

/// `current + delta`, refusing to go below zero.
pub fn apply_delta(item: &str, current: Decimal, delta: Decimal) -> Result<Decimal, AppError> {
    let next = current + delta;
    if next < Decimal::ZERO {
        return Err(AppError::InsufficientStock {
            item: item.to_string(),
            available: current,
            requested: -delta,
        });
    }
    Ok(next)
}

/// Applies `lines` in order to the given items without touching them.
///
/// Any line that would leave an item below zero rejects the whole plan.
pub fn plan(items: &HashMap<i64, StockItem>, lines: &[LedgerLine]) -> Result<Plan, AppError> {
    let mut quantities: BTreeMap<i64, Decimal> = BTreeMap::new();
    let mut entries = Vec::with_capacity(lines.len());

    for line in lines {
        line.validate()?;
        let item = items
            .get(&line.stock_item_id)
            .ok_or_else(|| AppError::not_found(format!("Stock item {} not found", line.stock_item_id)))?;

        // Columns hold three decimals; stock must equal the sum of the stored deltas.
        let delta = round_quantity(match line.measure {
            Some(measure) => measure.convert(line.delta, item.measure)?,
            None => line.delta,
        });
        if delta.is_zero() {
            return Err(AppError::validation(format!(
                "Quantity for {} rounds to 0",
                item.name
            )));
        }

        let current = quantities.get(&item.id).copied().unwrap_or(item.quantity);
        let next = apply_delta(&item.name, current, delta)?;
        quantities.insert(item.id, next);

        entries.push(PlannedEntry {
            stock_item_id: item.id,
            delta,
            unit_price: round_price(line.unit_price.unwrap_or(item.unit_cost)),
            reverses_id: line.reverses_id,
        });
    }

    Ok(Plan { entries, quantities })
}

/// Movements that sell `quantity` units of `product`.
///
/// A product with a recipe consumes its ingredients at their unit cost; a product
/// without one is drawn from its own stock.
pub fn sale_lines(
    product: &StockItem,
    recipe: &[RecipeEntry],
    ingredient_costs: &HashMap<i64, Decimal>,
    quantity: Decimal,
) -> Result<Vec<LedgerLine>, AppError> {
    if product.kind != StockKind::Product {
        return Err(AppError::validation(format!("{} is not a product", product.name)));
    }
    if quantity <= Decimal::ZERO {
        return Err(AppError::validation(format!(
            "Enter a quantity greater than 0 for {}",
            product.name
        )));
    }

    if recipe.is_empty() {
        return Ok(vec![LedgerLine::new(product.id, -quantity).at_price(product.unit_cost)]);
    }

    Ok(recipe
        .iter()
        .map(|entry| {
            let mut line = LedgerLine::new(entry.ingredient_id, -(entry.quantity * quantity));
            line.unit_price = ingredient_costs.get(&entry.ingredient_id).copied();
            line
        })
        .collect())
}

/// Records `lines` as one atomic batch on behalf of `user_id`.
#[instrument(skip(pool, lines, note), fields(count = lines.len()))]
pub async fn record_lines(
    pool: &PgPool,
    user_id: i64,
    lines: Vec<LedgerLine>,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
) -> Result<Vec<Movement>, AppError> {
    if lines.is_empty() {
        return Err(AppError::validation("Select at least 1 stock item"));
    }
    for line in &lines {
        line.validate()?;
    }

    let mut tx = pool.begin().await?;
    let movements = record_lines_in(&mut tx, user_id, &lines, note.as_deref(), occurred_at).await?;
    tx.commit().await?;

    info!(user_id, count = movements.len(), "Movements recorded");
    Ok(movements)
}

/// Single-line form of [`record_lines`].
pub async fn record_movement(
    pool: &PgPool,
    user_id: i64,
    line: LedgerLine,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
) -> Result<Movement, AppError> {
    let mut movements = record_lines(pool, user_id, vec![line], note, occurred_at).await?;
    movements
        .pop()
        .ok_or_else(|| AppError::internal("Ledger write returned no movement"))
}

/// Sells `quantity` units of a product in one transaction.
#[instrument(skip(pool, note))]
pub async fn record_sale(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
    quantity: Decimal,
    note: Option<String>,
    occurred_at: DateTime<Utc>,
) -> Result<Vec<Movement>, AppError> {
    let mut tx = pool.begin().await?;

    let product = sqlx::query_as::<_, StockItem>(&format!(
        "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items WHERE id = $1"
    ))
    .bind(product_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Product not found"))?;

    let recipe = fetch_recipe(&mut tx, product_id).await?;
    let costs: HashMap<i64, Decimal> = sqlx::query_as::<_, (i64, Decimal)>(
        "SELECT s.id, s.unit_cost
         FROM recipe_entries r
         JOIN stock_items s ON s.id = r.ingredient_id
         WHERE r.product_id = $1",
    )
    .bind(product_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    let lines = sale_lines(&product, &recipe, &costs, quantity)?;
    let note = note.unwrap_or_else(|| format!("Sale of {quantity} x {}", product.name));
    let movements = record_lines_in(&mut tx, user_id, &lines, Some(&note), occurred_at).await?;
    tx.commit().await?;

    info!(user_id, product_id, %quantity, "Sale recorded");
    Ok(movements)
}

/// Offsets movement `movement_id` with an opposite entry at the same unit price.
#[instrument(skip(pool))]
pub async fn reverse_movement(
    pool: &PgPool,
    user_id: i64,
    movement_id: i64,
) -> Result<Movement, AppError> {
    let mut tx = pool.begin().await?;

    let original = sqlx::query_as::<_, Movement>(&format!(
        "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE id = $1"
    ))
    .bind(movement_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Movement not found"))?;

    if original.reverses_id.is_some() {
        return Err(AppError::validation("A reversal cannot be reversed"));
    }

    let already_reversed = sqlx::query_scalar::<_, i64>("SELECT id FROM movements WHERE reverses_id = $1")
        .bind(movement_id)
        .fetch_optional(&mut *tx)
        .await?;
    if let Some(reversal_id) = already_reversed {
        return Err(AppError::conflict(format!(
            "Movement {movement_id} was already reversed by movement {reversal_id}"
        )));
    }

    let line = LedgerLine {
        stock_item_id: original.stock_item_id,
        delta: -original.delta,
        unit_price: Some(original.unit_price),
        measure: None,
        reverses_id: Some(original.id),
    };
    let note = format!("Reversal of movement #{}", original.id);
    let mut movements = record_lines_in(&mut tx, user_id, &[line], Some(&note), Utc::now()).await?;
    tx.commit().await?;

    info!(user_id, movement_id, "Movement reversed");
    movements
        .pop()
        .ok_or_else(|| AppError::internal("Ledger write returned no movement"))
}

pub async fn fetch_recipe(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
) -> Result<Vec<RecipeEntry>, AppError> {
    let recipe = sqlx::query_as::<_, RecipeEntry>(
        "SELECT r.product_id, r.ingredient_id, s.name AS ingredient_name, s.measure, r.quantity
         FROM recipe_entries r
         JOIN stock_items s ON s.id = r.ingredient_id
         WHERE r.product_id = $1
         ORDER BY s.name",
    )
    .bind(product_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(recipe)
}

async fn record_lines_in(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    lines: &[LedgerLine],
    note: Option<&str>,
    occurred_at: DateTime<Utc>,
) -> Result<Vec<Movement>, AppError> {
    let is_active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    if !is_active {
        return Err(AppError::unauthorized("User account is disabled"));
    }

    // Lock in ascending id order so concurrent batches cannot deadlock.
    let mut ids: Vec<i64> = lines.iter().map(|l| l.stock_item_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let items: HashMap<i64, StockItem> = sqlx::query_as::<_, StockItem>(&format!(
        "SELECT {STOCK_ITEM_COLUMNS} FROM stock_items WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(ids.as_slice())
    .fetch_all(&mut **tx)
    .await?
    .into_iter()
    .map(|item| (item.id, item))
    .collect();

    let plan = plan(&items, lines)?;

    for (id, quantity) in &plan.quantities {
        sqlx::query("UPDATE stock_items SET quantity = $1, updated_at = NOW() WHERE id = $2")
            .bind(quantity)
            .bind(id)
            .execute(&mut **tx)
            .await?;
    }

    let mut movements = Vec::with_capacity(plan.entries.len());
    for entry in plan.entries {
        let movement = sqlx::query_as::<_, Movement>(&format!(
            "INSERT INTO movements (stock_item_id, user_id, delta, unit_price, note, reverses_id, occurred_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {MOVEMENT_COLUMNS}"
        ))
        .bind(entry.stock_item_id)
        .bind(user_id)
        .bind(entry.delta)
        .bind(entry.unit_price)
        .bind(note)
        .bind(entry.reverses_id)
        .bind(occurred_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_constraint_violation(e, "Movement was already reversed"))?;
        movements.push(movement);
    }

    Ok(movements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(num: i64, scale: u32) -> Decimal {
        Decimal::new(num, scale)
    }

    fn item(id: i64, name: &str, kind: StockKind, measure: Measure, quantity: Decimal, unit_cost: Decimal) -> StockItem {
        StockItem {
            id,
            name: name.to_string(),
            kind,
            category_id: None,
            measure,
            quantity,
            min_quantity: Decimal::ZERO,
            unit_cost,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn stock(items: Vec<StockItem>) -> HashMap<i64, StockItem> {
        items.into_iter().map(|i| (i.id, i)).collect()
    }

    #[test]
    fn overdraw_is_rejected_and_quantity_is_untouched() {
        let items = stock(vec![item(1, "Mozzarella", StockKind::Ingredient, Measure::Unit, dec(10, 0), dec(2, 0))]);

        let err = plan(&items, &[LedgerLine::new(1, dec(-15, 0)).at_price(dec(2, 0))]).unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientStock { ref available, ref requested, .. }
                if *available == dec(10, 0) && *requested == dec(15, 0)
        ));
        assert_eq!(items[&1].quantity, dec(10, 0));

        let ok = plan(&items, &[LedgerLine::new(1, dec(-3, 0)).at_price(dec(20, 1))]).unwrap();
        assert_eq!(ok.quantities[&1], dec(7, 0));
        assert_eq!(ok.entries[0].delta, dec(-3, 0));
        assert_eq!(ok.entries[0].delta * ok.entries[0].unit_price, dec(-6, 0));
    }

    #[test]
    fn final_quantity_is_initial_plus_sum_of_deltas() {
        let items = stock(vec![item(1, "Flour", StockKind::Ingredient, Measure::Kg, dec(5, 0), dec(4, 0))]);
        let deltas = [dec(3, 0), dec(-2, 0), dec(-6, 0), dec(125, 1), dec(-125, 1)];
        let lines: Vec<LedgerLine> = deltas.iter().map(|d| LedgerLine::new(1, *d)).collect();

        let result = plan(&items, &lines).unwrap();

        let expected = deltas.iter().fold(dec(5, 0), |acc, d| acc + d);
        assert_eq!(result.quantities[&1], expected);

        let mut running = dec(5, 0);
        for entry in &result.entries {
            running += entry.delta;
            assert!(running >= Decimal::ZERO);
        }
    }

    #[test]
    fn intermediate_overdraw_rejects_the_batch_even_if_it_recovers() {
        let items = stock(vec![item(1, "Tomato", StockKind::Ingredient, Measure::Unit, dec(2, 0), dec(1, 0))]);
        let lines = [LedgerLine::new(1, dec(-3, 0)), LedgerLine::new(1, dec(5, 0))];
        assert!(matches!(plan(&items, &lines), Err(AppError::InsufficientStock { .. })));
    }

    #[test]
    fn draining_to_exactly_zero_is_allowed() {
        let items = stock(vec![item(1, "Basil", StockKind::Ingredient, Measure::Unit, dec(4, 0), dec(1, 0))]);
        let result = plan(&items, &[LedgerLine::new(1, dec(-4, 0))]).unwrap();
        assert!(result.quantities[&1].is_zero());
    }

    #[test]
    fn unknown_item_is_not_found() {
        let items = stock(vec![]);
        assert!(matches!(
            plan(&items, &[LedgerLine::new(9, dec(1, 0))]),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn zero_delta_and_negative_price_are_validation_errors() {
        assert!(matches!(
            LedgerLine::new(1, Decimal::ZERO).validate(),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            LedgerLine::new(1, dec(1, 0)).at_price(dec(-1, 0)).validate(),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn measure_is_converted_and_price_defaults_to_unit_cost() {
        let items = stock(vec![item(1, "Cheese", StockKind::Ingredient, Measure::Kg, dec(2, 0), dec(3550, 2))]);
        let result = plan(&items, &[LedgerLine::new(1, dec(500, 0)).in_measure(Measure::G)]).unwrap();

        assert_eq!(result.entries[0].delta, dec(5, 1));
        assert_eq!(result.entries[0].unit_price, dec(3550, 2));
        assert_eq!(result.quantities[&1], dec(25, 1));
    }

    #[test]
    fn sub_scale_deltas_are_rounded_before_planning() {
        let items = stock(vec![item(1, "Oregano", StockKind::Ingredient, Measure::Kg, dec(1, 0), dec(1, 0))]);

        let result = plan(&items, &[LedgerLine::new(1, dec(-5, 1)).in_measure(Measure::G)]).unwrap();
        assert_eq!(result.entries[0].delta, dec(-1, 3));
        assert_eq!(result.quantities[&1], dec(999, 3));
        assert_eq!(result.quantities[&1], dec(1, 0) + result.entries[0].delta);

        let err = plan(&items, &[LedgerLine::new(1, dec(4, 1)).in_measure(Measure::G)]).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn unit_price_is_rounded_to_cents() {
        let items = stock(vec![item(1, "Olive oil", StockKind::Ingredient, Measure::Unit, dec(5, 0), dec(1, 0))]);
        let result = plan(&items, &[LedgerLine::new(1, dec(-1, 0)).at_price(dec(12345, 3))]).unwrap();
        assert_eq!(result.entries[0].unit_price, dec(1235, 2));
    }

    #[test]
    fn sale_consumes_recipe_ingredients() {
        let pizza = item(10, "Margherita", StockKind::Product, Measure::Unit, Decimal::ZERO, dec(45, 0));
        let recipe = vec![
            RecipeEntry {
                product_id: 10,
                ingredient_id: 1,
                ingredient_name: "Mozzarella".into(),
                measure: Measure::Kg,
                quantity: dec(2, 1),
            },
            RecipeEntry {
                product_id: 10,
                ingredient_id: 2,
                ingredient_name: "Dough".into(),
                measure: Measure::Unit,
                quantity: dec(1, 0),
            },
        ];
        let costs = HashMap::from([(1, dec(40, 0)), (2, dec(3, 0))]);

        let lines = sale_lines(&pizza, &recipe, &costs, dec(3, 0)).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].stock_item_id, 1);
        assert_eq!(lines[0].delta, dec(-6, 1));
        assert_eq!(lines[0].unit_price, Some(dec(40, 0)));
        assert_eq!(lines[1].delta, dec(-3, 0));
    }

    #[test]
    fn sale_without_recipe_draws_the_product_itself() {
        let soda = item(11, "Soda", StockKind::Product, Measure::Unit, dec(24, 0), dec(5, 0));
        let lines = sale_lines(&soda, &[], &HashMap::new(), dec(2, 0)).unwrap();
        assert_eq!(lines, vec![LedgerLine::new(11, dec(-2, 0)).at_price(dec(5, 0))]);
    }

    #[test]
    fn only_products_can_be_sold() {
        let flour = item(1, "Flour", StockKind::Ingredient, Measure::Kg, dec(5, 0), dec(4, 0));
        assert!(sale_lines(&flour, &[], &HashMap::new(), dec(1, 0)).is_err());
        let soda = item(11, "Soda", StockKind::Product, Measure::Unit, dec(24, 0), dec(5, 0));
        assert!(sale_lines(&soda, &[], &HashMap::new(), Decimal::ZERO).is_err());
    }

    // Ledger writes against a migrated database.

    async fn insert_user(pool: &PgPool) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO users (email, first_name, last_name, password_hash, role)
             VALUES ('cook@pizza.test', 'Ana', 'Souza', 'not-a-hash', 'employee') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn insert_item(pool: &PgPool, name: &str, measure: Measure, quantity: Decimal) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO stock_items (name, kind, measure, quantity, unit_cost)
             VALUES ($1, 'ingredient', $2, $3, 2) RETURNING id",
        )
        .bind(name)
        .bind(measure)
        .bind(quantity)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn stored_quantity(pool: &PgPool, id: i64) -> Decimal {
        sqlx::query_scalar("SELECT quantity FROM stock_items WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn movement_count(pool: &PgPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM movements")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rejected_overdraw_leaves_stock_and_ledger_untouched(pool: PgPool) {
        let user = insert_user(&pool).await;
        let cheese = insert_item(&pool, "Mozzarella", Measure::Unit, dec(10, 0)).await;

        let err = record_movement(&pool, user, LedgerLine::new(cheese, dec(-15, 0)), None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { .. }));
        assert_eq!(stored_quantity(&pool, cheese).await, dec(10, 0));
        assert_eq!(movement_count(&pool).await, 0);

        let movement = record_movement(
            &pool,
            user,
            LedgerLine::new(cheese, dec(-3, 0)).at_price(dec(20, 1)),
            None,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(movement.delta, dec(-3, 0));
        assert_eq!(stored_quantity(&pool, cheese).await, dec(7, 0));
        assert_eq!(movement_count(&pool).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn failing_line_rolls_back_the_whole_batch(pool: PgPool) {
        let user = insert_user(&pool).await;
        let flour = insert_item(&pool, "Flour", Measure::Kg, dec(5, 0)).await;
        let tomato = insert_item(&pool, "Tomato", Measure::Unit, dec(2, 0)).await;

        let lines = vec![LedgerLine::new(flour, dec(-1, 0)), LedgerLine::new(tomato, dec(-100, 0))];
        let err = record_lines(&pool, user, lines, None, Utc::now()).await.unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock { .. }));
        assert_eq!(stored_quantity(&pool, flour).await, dec(5, 0));
        assert_eq!(stored_quantity(&pool, tomato).await, dec(2, 0));
        assert_eq!(movement_count(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_user_is_not_found(pool: PgPool) {
        let flour = insert_item(&pool, "Flour", Measure::Kg, dec(5, 0)).await;

        let err = record_movement(&pool, 9_999, LedgerLine::new(flour, dec(1, 0)), None, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(stored_quantity(&pool, flour).await, dec(5, 0));
        assert_eq!(movement_count(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn movement_is_reversed_at_most_once(pool: PgPool) {
        let user = insert_user(&pool).await;
        let flour = insert_item(&pool, "Flour", Measure::Kg, dec(5, 0)).await;

        let inflow = record_movement(&pool, user, LedgerLine::new(flour, dec(3, 0)), None, Utc::now())
            .await
            .unwrap();
        let reversal = reverse_movement(&pool, user, inflow.id).await.unwrap();

        assert_eq!(reversal.delta, dec(-3, 0));
        assert_eq!(reversal.reverses_id, Some(inflow.id));
        assert_eq!(reversal.unit_price, inflow.unit_price);
        assert_eq!(stored_quantity(&pool, flour).await, dec(5, 0));

        assert!(matches!(
            reverse_movement(&pool, user, inflow.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            reverse_movement(&pool, user, reversal.id).await,
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(movement_count(&pool).await, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn stored_stock_matches_initial_plus_stored_deltas(pool: PgPool) {
        let user = insert_user(&pool).await;
        let oregano = insert_item(&pool, "Oregano", Measure::Kg, dec(1, 0)).await;

        let lines = vec![
            LedgerLine::new(oregano, dec(-5, 1)).in_measure(Measure::G),
            LedgerLine::new(oregano, dec(1250, 0)).in_measure(Measure::G),
            LedgerLine::new(oregano, dec(-3333, 4)),
        ];
        record_lines(&pool, user, lines, None, Utc::now()).await.unwrap();

        let sum: Decimal = sqlx::query_scalar("SELECT SUM(delta) FROM movements WHERE stock_item_id = $1")
            .bind(oregano)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored_quantity(&pool, oregano).await, dec(1, 0) + sum);

        let err = record_movement(
            &pool,
            user,
            LedgerLine::new(oregano, dec(4, 1)).in_measure(Measure::G),
            None,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
