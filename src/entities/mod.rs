//! SeaORM entities for the back office.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use validator::ValidationError;

pub mod advance_adjustment;
pub mod audit_log;
pub mod bill_adjustment;
pub mod bill_adjustment_image;
pub mod business_logo;
pub mod category;
pub mod discount;
pub mod end_day;
pub mod order;
pub mod order_item;
pub mod payment_transaction;
pub mod product;
pub mod sales_summary;
pub mod setting;
pub mod user;

/// Largest amount a `decimal(12, 2)` money column holds.
pub const MAX_MONEY: Decimal = dec!(9999999999.99);

fn within_money_range(value: &Decimal) -> Result<(), ValidationError> {
    if *value > MAX_MONEY {
        let mut err = ValidationError::new("max_money");
        err.message = Some(format!("amount cannot exceed {}", MAX_MONEY).into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("amount cannot be negative".into());
        return Err(err);
    }
    within_money_range(value)
}

pub(crate) fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("amount must be greater than zero".into());
        return Err(err);
    }
    within_money_range(value)
}

/// Converts a validated model failure into the error SeaORM surfaces from `before_save`.
pub(crate) fn validation_db_err(err: validator::ValidationErrors) -> sea_orm::DbErr {
    sea_orm::DbErr::Custom(format!("Validation error: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_validators_stop_at_the_column_limit() {
        assert!(validate_positive(&MAX_MONEY).is_ok());
        assert!(validate_non_negative(&Decimal::ZERO).is_ok());
        assert!(validate_positive(&dec!(10000000000)).is_err());
        assert!(validate_non_negative(&dec!(100000000000000000000000000)).is_err());
        assert!(validate_non_negative(&dec!(-0.01)).is_err());
    }
}
