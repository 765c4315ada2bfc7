//! Agrowaste feedstock ledger.
//!
//! Current stock is never stored: it is rebuilt from the full transaction log
//! every time the log changes. Everything here is a pure function of its
//! inputs so the same code serves the HTTP handlers, the persisted
//! stock check in [`crate::store`] and the tests.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{Action, TransactionForm, TransactionRecord};

// ---

/// Running total (kg) per material. Keys iterate in name order.
pub type StockMapping = BTreeMap<String, Decimal>;

/// Fold a transaction log into per-material stock.
///
/// `Add` increases and `Consume` decreases the material's total. Results are
/// not clamped, so a log that over-consumes yields a negative entry.
pub fn reduce<'a, I>(records: I) -> StockMapping
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    // ---
    let mut stock = StockMapping::new();
    for record in records {
        apply(&mut stock, record.action, &record.material_type, record.quantity);
    }
    stock
}

fn apply(stock: &mut StockMapping, action: Action, material: &str, quantity: Decimal) {
    let entry = stock.entry(material.to_string()).or_insert(Decimal::ZERO);
    match action {
        Action::Add => *entry += quantity,
        Action::Consume => *entry -= quantity,
    }
}

/// Result of [`lowest_stock`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LowestStock {
    Material { material: String, stock: Decimal },
    NoStock,
}

/// Pick the material with the smallest strictly positive stock.
///
/// Ties go to the material whose name sorts first.
pub fn lowest_stock(stock: &StockMapping) -> LowestStock {
    // ---
    stock
        .iter()
        .filter(|(_, qty)| **qty > Decimal::ZERO)
        .fold(None::<(&String, &Decimal)>, |lowest, (material, qty)| match lowest {
            Some((_, low)) if low <= qty => lowest,
            _ => Some((material, qty)),
        })
        .map_or(LowestStock::NoStock, |(material, qty)| LowestStock::Material {
            material: material.clone(),
            stock: *qty,
        })
}

// ---

/// A validated transaction ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub action: Action,
    pub material_type: String,
    pub quantity: Decimal,
}

impl NewTransaction {
    /// Validate a submitted form.
    ///
    /// The material name is trimmed and must not be empty. The quantity must
    /// parse as a finite decimal greater than zero; malformed quantities are
    /// rejected rather than defaulted.
    pub fn parse(form: TransactionForm) -> Result<Self, AppError> {
        // ---
        let material_type = form.material_type.trim().to_string();
        if material_type.is_empty() {
            return Err(AppError::Validation("material name is required".into()));
        }

        let quantity = parse_quantity(&form.quantity)?;
        if quantity <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "quantity must be greater than zero, got {}",
                quantity
            )));
        }

        Ok(NewTransaction {
            action: form.action,
            material_type,
            quantity: quantity.normalize(),
        })
    }
}

fn parse_quantity(value: &Value) -> Result<Decimal, AppError> {
    // ---
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(AppError::Validation(format!(
                "quantity must be a number, got {}",
                other
            )))
        }
    };

    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| AppError::Validation(format!("quantity '{}' is not a number", text)))
}

/// Reject a Consume that asks for more than `stock` currently holds.
///
/// Adds always pass. Unknown materials count as zero stock.
pub fn check_consume(stock: &StockMapping, tx: &NewTransaction) -> Result<(), AppError> {
    // ---
    if tx.action != Action::Consume {
        return Ok(());
    }

    let available = stock
        .get(&tx.material_type)
        .copied()
        .unwrap_or(Decimal::ZERO);
    if available < tx.quantity {
        return Err(AppError::InsufficientStock {
            material: tx.material_type.clone(),
            available: available.round_dp(1),
        });
    }
    Ok(())
}

// ---

/// One bar of the feedstock distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockBar {
    pub material: String,
    pub stock: Decimal,
}

/// One line of the recent activity table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    #[serde(flatten)]
    pub record: TransactionRecord,
    /// `YYYY-MM-DD HH:MM` in UTC, or `Pending...` before the server stamps it.
    pub date: String,
}

/// Everything the agrowaste view shows, derived from one ledger snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerView {
    pub stock: StockMapping,
    pub lowest: Option<LowestStock>,
    pub chart: Vec<StockBar>,
    pub recent: Vec<ActivityEntry>,
    pub transaction_count: usize,
}

impl LedgerView {
    /// Build the view from the full, creation-ordered log.
    ///
    /// `recent_limit` caps the activity table only; stock always covers the
    /// whole log.
    pub fn from_records(records: &[TransactionRecord], recent_limit: usize) -> Self {
        // ---
        let stock = reduce(records);
        let lowest = Some(lowest_stock(&stock));
        let chart = stock
            .iter()
            .filter(|(_, qty)| **qty > Decimal::ZERO)
            .map(|(material, qty)| StockBar {
                material: material.clone(),
                stock: *qty,
            })
            .collect();
        let recent = records
            .iter()
            .rev()
            .take(recent_limit)
            .map(|record| ActivityEntry {
                date: record
                    .timestamp
                    .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "Pending...".to_string()),
                record: record.clone(),
            })
            .collect();

        LedgerView {
            stock,
            lowest,
            chart,
            recent,
            transaction_count: records.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::LEDGER_USER;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn record(action: Action, material: &str, qty: i64) -> TransactionRecord {
        TransactionRecord {
            id: Uuid::new_v4(),
            action,
            material_type: material.to_string(),
            quantity: Decimal::from(qty),
            timestamp: Some(Utc.with_ymd_and_hms(2025, 3, 26, 8, 0, 0).unwrap()),
            user: LEDGER_USER.to_string(),
        }
    }

    fn form(action: Action, material: &str, quantity: Value) -> TransactionForm {
        TransactionForm {
            action,
            material_type: material.to_string(),
            quantity,
        }
    }

    fn scenario_log() -> Vec<TransactionRecord> {
        vec![
            record(Action::Add, "Corn", 50),
            record(Action::Consume, "Corn", 20),
            record(Action::Add, "Husk", 10),
        ]
    }

    #[test]
    fn test_reduce_scenario() {
        // ---
        let stock = reduce(&scenario_log());
        assert_eq!(stock.len(), 2);
        assert_eq!(stock["Corn"], Decimal::from(30));
        assert_eq!(stock["Husk"], Decimal::from(10));

        assert_eq!(
            lowest_stock(&stock),
            LowestStock::Material {
                material: "Husk".into(),
                stock: Decimal::from(10)
            }
        );
    }

    #[test]
    fn test_reduce_equals_adds_minus_consumes() {
        // ---
        let log = vec![
            record(Action::Add, "Corn", 7),
            record(Action::Add, "Bagasse", 3),
            record(Action::Consume, "Corn", 2),
            record(Action::Add, "Corn", 11),
            record(Action::Consume, "Bagasse", 1),
            record(Action::Consume, "Corn", 5),
        ];
        let stock = reduce(&log);

        for material in ["Corn", "Bagasse"] {
            let signed: Decimal = log
                .iter()
                .filter(|r| r.material_type == material)
                .map(|r| match r.action {
                    Action::Add => r.quantity,
                    Action::Consume => -r.quantity,
                })
                .sum();
            assert_eq!(stock[material], signed, "mismatch for {}", material);
        }
    }

    #[test]
    fn test_reduce_is_order_independent() {
        // ---
        let mut log = vec![
            record(Action::Add, "Corn", 50),
            record(Action::Consume, "Corn", 20),
            record(Action::Add, "Husk", 10),
            record(Action::Consume, "Husk", 4),
            record(Action::Add, "Corn", 1),
        ];
        log[1].quantity = Decimal::new(205, 1);
        let forward = reduce(&log);

        log.reverse();
        assert_eq!(reduce(&log), forward);

        log.rotate_left(2);
        assert_eq!(reduce(&log), forward);
    }

    #[test]
    fn test_reduce_allows_negative_and_empty_keys() {
        // ---
        let log = vec![
            record(Action::Add, "Corn", 5),
            record(Action::Consume, "Corn", 8),
            record(Action::Add, "", 2),
        ];
        let stock = reduce(&log);
        assert_eq!(stock["Corn"], Decimal::from(-3));
        assert_eq!(stock[""], Decimal::from(2));
    }

    #[test]
    fn test_reduce_double_counts_duplicates() {
        // ---
        let add = record(Action::Add, "Corn", 5);
        let stock = reduce(&[add.clone(), add]);
        assert_eq!(stock["Corn"], Decimal::from(10));
    }

    #[test]
    fn test_lowest_stock_ignores_non_positive() {
        // ---
        let mut stock = StockMapping::new();
        stock.insert("Corn".into(), Decimal::ZERO);
        stock.insert("Husk".into(), Decimal::from(-4));
        assert_eq!(lowest_stock(&stock), LowestStock::NoStock);
        assert_eq!(lowest_stock(&StockMapping::new()), LowestStock::NoStock);

        stock.insert("Straw".into(), Decimal::from(12));
        stock.insert("Bagasse".into(), Decimal::from(30));
        assert_eq!(
            lowest_stock(&stock),
            LowestStock::Material {
                material: "Straw".into(),
                stock: Decimal::from(12)
            }
        );
    }

    #[test]
    fn test_lowest_stock_is_minimal() {
        // ---
        let values = [9, 3, 17, 3, 40, -2, 0, 5];
        let stock: StockMapping = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("m{}", i), Decimal::from(*v)))
            .collect();

        match lowest_stock(&stock) {
            LowestStock::Material { material, stock: low } => {
                // Tie between m1 and m3 resolves to the first name.
                assert_eq!(material, "m1");
                for qty in stock.values().filter(|q| **q > Decimal::ZERO) {
                    assert!(low <= *qty);
                }
            }
            LowestStock::NoStock => panic!("expected a material"),
        }
    }

    #[test]
    fn test_parse_trims_material_and_accepts_text_quantity() {
        // ---
        let tx = NewTransaction::parse(form(Action::Add, "  Rice Husk ", json!("12.50"))).unwrap();
        assert_eq!(tx.material_type, "Rice Husk");
        assert_eq!(tx.quantity, Decimal::new(125, 1));

        let tx = NewTransaction::parse(form(Action::Consume, "Corn", json!(7.25))).unwrap();
        assert_eq!(tx.quantity, Decimal::new(725, 2));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        // ---
        let cases = [
            form(Action::Add, "   ", json!(5)),
            form(Action::Add, "Corn", json!("abc")),
            form(Action::Add, "Corn", json!("")),
            form(Action::Add, "Corn", json!(0)),
            form(Action::Add, "Corn", json!(-3)),
            form(Action::Add, "Corn", json!(null)),
            form(Action::Add, "Corn", json!(true)),
        ];
        for case in cases {
            let quantity = case.quantity.clone();
            match NewTransaction::parse(case) {
                Err(AppError::Validation(_)) => {}
                other => panic!("expected validation error for {}, got {:?}", quantity, other),
            }
        }
    }

    #[test]
    fn test_consume_over_stock_is_rejected() {
        // ---
        let mut stock = StockMapping::new();
        stock.insert("Corn".into(), Decimal::from(20));

        let tx = NewTransaction::parse(form(Action::Consume, "Corn", json!(25))).unwrap();
        match check_consume(&stock, &tx) {
            Err(AppError::InsufficientStock { material, available }) => {
                assert_eq!(material, "Corn");
                assert_eq!(available, Decimal::from(20));
            }
            other => panic!("expected insufficient stock, got {:?}", other),
        }

        let exact = NewTransaction::parse(form(Action::Consume, "Corn", json!(20))).unwrap();
        assert!(check_consume(&stock, &exact).is_ok());

        let unknown = NewTransaction::parse(form(Action::Consume, "Husk", json!(1))).unwrap();
        assert!(check_consume(&stock, &unknown).is_err());

        let add = NewTransaction::parse(form(Action::Add, "Husk", json!(1))).unwrap();
        assert!(check_consume(&stock, &add).is_ok());
    }

    #[test]
    fn test_view_from_records() {
        // ---
        let mut log = scenario_log();
        log.push(record(Action::Add, "Straw", 4));
        log.push(record(Action::Consume, "Straw", 4));
        log.last_mut().unwrap().timestamp = None;

        let view = LedgerView::from_records(&log, 3);

        assert_eq!(view.stock["Straw"], Decimal::ZERO);
        assert_eq!(
            view.chart.iter().map(|b| b.material.as_str()).collect::<Vec<_>>(),
            vec!["Corn", "Husk"]
        );
        assert_eq!(view.transaction_count, 5);
        assert_eq!(view.recent.len(), 3);
        assert_eq!(view.recent[0].date, "Pending...");
        assert_eq!(view.recent[0].record.material_type, "Straw");
        assert_eq!(view.recent[2].record.material_type, "Husk");
        assert_eq!(view.recent[2].date, "2025-03-26 08:00");
        assert_eq!(
            view.lowest,
            Some(LowestStock::Material {
                material: "Husk".into(),
                stock: Decimal::from(10)
            })
        );
    }
}
