//! Stock planning for order mutations.
//!
//! Planning is pure: callers load and lock the product rows, describe the old
//! and new requested quantities per product and apply the returned deltas in
//! the same transaction.

use crate::errors::ServiceError;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Requested quantity change for one product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: Uuid,
    pub name: String,
    pub running_item: bool,
    /// Units on hand before this change
    pub available: i32,
    pub old_quantity: i32,
    pub new_quantity: i32,
}

/// Delta to apply to a product's stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub product_id: Uuid,
    pub delta: i32,
    pub new_quantity: i32,
}

/// Most units a single order line may carry.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

pub fn insufficient_stock(name: &str, requested: i32, available: i32) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "Insufficient stock for {}: requested {}, available {}",
        name, requested, available
    ))
}

fn quantity_out_of_range(name: &str) -> ServiceError {
    ServiceError::ValidationError(format!(
        "Quantity for {} is out of range; a line holds at most {} units",
        name, MAX_LINE_QUANTITY
    ))
}

/// Returns the stock deltas for `lines`, or the first shortage.
///
/// Running items and unchanged quantities produce no delta. A shortage
/// reports the additional units requested against what is on hand.
pub fn plan_stock_changes(lines: &[StockLine]) -> Result<Vec<StockChange>, ServiceError> {
    let mut changes = Vec::with_capacity(lines.len());

    for line in lines {
        if line.running_item {
            continue;
        }
        let increase = line
            .new_quantity
            .checked_sub(line.old_quantity)
            .ok_or_else(|| quantity_out_of_range(&line.name))?;
        if increase == 0 {
            continue;
        }
        if increase > line.available {
            return Err(insufficient_stock(&line.name, increase, line.available));
        }
        let new_quantity = line
            .available
            .checked_sub(increase)
            .ok_or_else(|| quantity_out_of_range(&line.name))?;
        changes.push(StockChange {
            product_id: line.product_id,
            delta: -increase,
            new_quantity,
        });
    }

    Ok(changes)
}

/// Sums quantities per product so duplicate order lines are checked together.
///
/// A product whose summed quantity exceeds [`MAX_LINE_QUANTITY`] is rejected.
pub fn merge_quantities<I>(lines: I) -> Result<BTreeMap<Uuid, i32>, ServiceError>
where
    I: IntoIterator<Item = (Uuid, i32)>,
{
    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
    for (product_id, quantity) in lines {
        let entry = merged.entry(product_id).or_insert(0);
        *entry = entry
            .checked_add(quantity)
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or_else(|| quantity_out_of_range(&product_id.to_string()))?;
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    fn line(running: bool, available: i32, old: i32, new: i32) -> StockLine {
        StockLine {
            product_id: Uuid::new_v4(),
            name: "Chicken Karahi".into(),
            running_item: running,
            available,
            old_quantity: old,
            new_quantity: new,
        }
    }

    #[test_case(10, 0, 3, -3, 7 ; "adding an item decrements stock")]
    #[test_case(7, 3, 5, -2, 5 ; "raising the quantity takes the difference")]
    #[test_case(5, 5, 2, 3, 8 ; "lowering the quantity gives units back")]
    #[test_case(2, 4, 0, 4, 6 ; "removing or cancelling restores everything")]
    #[test_case(0, 0, 0, 0, 0 ; "exhausting stock is allowed")]
    fn deltas(available: i32, old: i32, new: i32, delta: i32, after: i32) {
        let changes = plan_stock_changes(&[line(false, available, old, new)]).unwrap();
        if delta == 0 {
            assert!(changes.is_empty());
        } else {
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].delta, delta);
            assert_eq!(changes[0].new_quantity, after);
        }
    }

    #[test]
    fn exact_stock_can_be_sold() {
        let changes = plan_stock_changes(&[line(false, 3, 0, 3)]).unwrap();
        assert_eq!(changes[0].new_quantity, 0);
    }

    #[test]
    fn running_items_never_move() {
        let changes = plan_stock_changes(&[line(true, 0, 0, 500)]).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn shortage_carries_an_explicit_message() {
        let err = plan_stock_changes(&[line(false, 2, 0, 5)]).unwrap_err();
        assert_matches!(
            err,
            ServiceError::InsufficientStock(ref msg)
                if msg == "Insufficient stock for Chicken Karahi: requested 5, available 2"
        );
    }

    #[test]
    fn first_shortage_stops_planning() {
        let ok = line(false, 10, 0, 1);
        let short = StockLine {
            name: "Zinger Burger".into(),
            ..line(false, 1, 0, 3)
        };
        let err = plan_stock_changes(&[ok, short]).unwrap_err();
        assert_matches!(err, ServiceError::InsufficientStock(ref msg) if msg.contains("Zinger Burger"));
    }

    #[test]
    fn merge_sums_duplicate_products() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_quantities([(a, 2), (b, 1), (a, 3)]).unwrap();
        assert_eq!(merged.get(&a), Some(&5));
        assert_eq!(merged.get(&b), Some(&1));
    }

    #[test]
    fn merged_quantities_stay_within_a_line() {
        let a = Uuid::new_v4();
        assert_matches!(
            merge_quantities([(a, i32::MAX), (a, i32::MAX)]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            merge_quantities([(a, MAX_LINE_QUANTITY), (a, 1)]),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn extreme_quantities_fail_instead_of_wrapping() {
        assert_matches!(
            plan_stock_changes(&[line(false, 5, i32::MIN, i32::MAX)]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            plan_stock_changes(&[line(false, i32::MAX, 10, 0)]),
            Err(ServiceError::ValidationError(_))
        );
    }
}
