//! Order total engine.
//!
//! Totals are computed in a fixed order: subtotal, discount, tax by payment
//! method, service charge for dine-in, flat charge for delivery. Every step is
//! rounded to two places (half away from zero) before the next one reads it.

use crate::config::AppConfig;
use crate::entities::discount::DiscountType;
use crate::entities::MAX_MONEY;
use crate::errors::ServiceError;
use crate::entities::order::{OrderType, PaymentMethod};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const HUNDRED: Decimal = dec!(100);

/// Rounds a money amount to two decimal places, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn too_large() -> ServiceError {
    ServiceError::ValidationError(format!(
        "Order amount is too large; totals cannot exceed {}",
        MAX_MONEY
    ))
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, ServiceError> {
    a.checked_mul(b).ok_or_else(too_large)
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal, ServiceError> {
    a.checked_add(b).ok_or_else(too_large)
}

fn percent_of(amount: Decimal, rate: Decimal) -> Result<Decimal, ServiceError> {
    Ok(round_money(mul(amount, rate)? / HUNDRED))
}

/// Business rates that feed the total engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingPolicy {
    pub tax_rate_card: Decimal,
    pub tax_rate_cash: Decimal,
    pub service_charge_percent: Decimal,
    pub delivery_charge: Decimal,
    pub enable_tax: bool,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_card: dec!(5),
            tax_rate_cash: dec!(15),
            service_charge_percent: dec!(10),
            delivery_charge: Decimal::ZERO,
            enable_tax: true,
        }
    }
}

impl PricingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            tax_rate_card: config.default_tax_rate_card,
            tax_rate_cash: config.default_tax_rate_cash,
            service_charge_percent: config.default_service_charge_percent,
            delivery_charge: config.default_delivery_charge,
            enable_tax: true,
        }
    }

    /// Card payments use the card rate; every other method uses the cash rate.
    pub fn tax_rate_for(&self, payment_method: PaymentMethod) -> Decimal {
        if !self.enable_tax {
            return Decimal::ZERO;
        }
        match payment_method {
            PaymentMethod::Card => self.tax_rate_card,
            PaymentMethod::Cash | PaymentMethod::Other => self.tax_rate_cash,
        }
    }
}

/// One priced order line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricedLine {
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn new(quantity: i32, unit_price: Decimal) -> Self {
        Self {
            quantity,
            unit_price,
        }
    }

    /// Quantity times unit price; fails instead of overflowing.
    pub fn line_total(&self) -> Result<Decimal, ServiceError> {
        Ok(round_money(mul(Decimal::from(self.quantity), self.unit_price)?))
    }
}

/// Discount resolved for an order, either from a code or entered at the till
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AppliedDiscount {
    pub discount_type: DiscountType,
    pub value: Decimal,
}

impl AppliedDiscount {
    pub fn percentage(value: Decimal) -> Self {
        Self {
            discount_type: DiscountType::Percentage,
            value,
        }
    }

    pub fn fixed(value: Decimal) -> Self {
        Self {
            discount_type: DiscountType::Fixed,
            value,
        }
    }

    /// Amount taken off `subtotal`, never more than the subtotal and never negative.
    pub fn amount_for(&self, subtotal: Decimal) -> Result<Decimal, ServiceError> {
        let raw = match self.discount_type {
            DiscountType::Percentage => percent_of(subtotal, self.value)?,
            DiscountType::Fixed => round_money(self.value),
        };
        Ok(raw.min(subtotal).max(Decimal::ZERO))
    }
}

/// Full breakdown of an order's money
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub service_charge: Decimal,
    pub delivery_charge: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    pub fn zero() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            taxable_amount: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            service_charge: Decimal::ZERO,
            delivery_charge: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }
}

/// Computes the totals for a set of lines.
///
/// Amounts that overflow, or a total beyond what a money column holds, are a
/// `ValidationError`.
pub fn compute_totals(
    lines: &[PricedLine],
    discount: Option<&AppliedDiscount>,
    payment_method: PaymentMethod,
    order_type: OrderType,
    policy: &PricingPolicy,
) -> Result<OrderTotals, ServiceError> {
    let mut subtotal = Decimal::ZERO;
    for line in lines {
        subtotal = add(subtotal, line.line_total()?)?;
    }
    let subtotal = round_money(subtotal);

    let discount_amount = match discount {
        Some(d) => d.amount_for(subtotal)?,
        None => Decimal::ZERO,
    };
    let taxable_amount = round_money(subtotal - discount_amount);

    let tax_rate = policy.tax_rate_for(payment_method);
    let tax_amount = percent_of(taxable_amount, tax_rate)?.max(Decimal::ZERO);

    let service_charge = match order_type {
        OrderType::DineIn => {
            percent_of(subtotal, policy.service_charge_percent)?.max(Decimal::ZERO)
        }
        _ => Decimal::ZERO,
    };

    let delivery_charge = match order_type {
        OrderType::Delivery => round_money(policy.delivery_charge).max(Decimal::ZERO),
        _ => Decimal::ZERO,
    };

    let total = round_money(add(
        add(taxable_amount, tax_amount)?,
        add(service_charge, delivery_charge)?,
    )?);
    if total > MAX_MONEY {
        return Err(too_large());
    }

    Ok(OrderTotals {
        subtotal,
        discount_amount,
        taxable_amount,
        tax_rate,
        tax_amount,
        service_charge,
        delivery_charge,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy() -> PricingPolicy {
        PricingPolicy {
            tax_rate_card: dec!(5),
            tax_rate_cash: dec!(15),
            service_charge_percent: dec!(10),
            delivery_charge: dec!(150),
            enable_tax: true,
        }
    }

    #[test]
    fn percentage_discount_then_cash_tax_for_take_away() {
        let lines = [PricedLine::new(2, dec!(500))];
        let totals = compute_totals(
            &lines,
            Some(&AppliedDiscount::percentage(dec!(10))),
            PaymentMethod::Cash,
            OrderType::TakeAway,
            &policy(),
        )
        .unwrap();

        assert_eq!(totals.subtotal, dec!(1000.00));
        assert_eq!(totals.discount_amount, dec!(100.00));
        assert_eq!(totals.taxable_amount, dec!(900.00));
        assert_eq!(totals.tax_amount, dec!(135.00));
        assert_eq!(totals.service_charge, Decimal::ZERO);
        assert_eq!(totals.delivery_charge, Decimal::ZERO);
        assert_eq!(totals.total, dec!(1035.00));
    }

    #[rstest]
    #[case(OrderType::DineIn, PaymentMethod::Card)]
    #[case(OrderType::TakeAway, PaymentMethod::Card)]
    #[case(OrderType::Delivery, PaymentMethod::Card)]
    fn card_always_uses_card_rate(#[case] order_type: OrderType, #[case] method: PaymentMethod) {
        let totals = compute_totals(
            &[PricedLine::new(1, dec!(200))],
            None,
            method,
            order_type,
            &policy(),
        )
        .unwrap();
        assert_eq!(totals.tax_rate, dec!(5));
        assert_eq!(totals.tax_amount, dec!(10.00));
    }

    #[rstest]
    #[case(OrderType::DineIn, dec!(100.00), Decimal::ZERO)]
    #[case(OrderType::TakeAway, Decimal::ZERO, Decimal::ZERO)]
    #[case(OrderType::Delivery, Decimal::ZERO, dec!(150.00))]
    fn charges_follow_order_type(
        #[case] order_type: OrderType,
        #[case] service: Decimal,
        #[case] delivery: Decimal,
    ) {
        let totals = compute_totals(
            &[PricedLine::new(4, dec!(250))],
            None,
            PaymentMethod::Other,
            order_type,
            &policy(),
        )
        .unwrap();
        assert_eq!(totals.service_charge, service);
        assert_eq!(totals.delivery_charge, delivery);
        assert_eq!(totals.total, dec!(1150.00) + service + delivery);
    }

    #[test]
    fn service_charge_is_taken_on_the_undiscounted_subtotal() {
        let totals = compute_totals(
            &[PricedLine::new(1, dec!(1000))],
            Some(&AppliedDiscount::fixed(dec!(200))),
            PaymentMethod::Cash,
            OrderType::DineIn,
            &policy(),
        )
        .unwrap();
        assert_eq!(totals.service_charge, dec!(100.00));
        assert_eq!(totals.tax_amount, dec!(120.00));
        assert_eq!(totals.total, dec!(1020.00));
    }

    #[rstest]
    #[case(AppliedDiscount::fixed(dec!(5000)))]
    #[case(AppliedDiscount::percentage(dec!(150)))]
    fn discount_is_capped_at_subtotal(#[case] discount: AppliedDiscount) {
        let totals = compute_totals(
            &[PricedLine::new(3, dec!(99.99))],
            Some(&discount),
            PaymentMethod::Cash,
            OrderType::TakeAway,
            &policy(),
        )
        .unwrap();
        assert_eq!(totals.discount_amount, totals.subtotal);
        assert_eq!(totals.taxable_amount, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn disabled_tax_yields_zero_tax() {
        let mut no_tax = policy();
        no_tax.enable_tax = false;
        let totals = compute_totals(
            &[PricedLine::new(1, dec!(100))],
            None,
            PaymentMethod::Card,
            OrderType::TakeAway,
            &no_tax,
        )
        .unwrap();
        assert_eq!(totals.tax_rate, Decimal::ZERO);
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total, dec!(100.00));
    }

    #[test]
    fn each_step_rounds_half_away_from_zero() {
        // 0.33 * 15% = 0.0495 -> 0.05
        let totals = compute_totals(
            &[PricedLine::new(1, dec!(0.333))],
            None,
            PaymentMethod::Cash,
            OrderType::TakeAway,
            &policy(),
        )
        .unwrap();
        assert_eq!(totals.subtotal, dec!(0.33));
        assert_eq!(totals.tax_amount, dec!(0.05));
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn empty_order_totals_are_zero() {
        let totals = compute_totals(
            &[],
            Some(&AppliedDiscount::percentage(dec!(10))),
            PaymentMethod::Cash,
            OrderType::TakeAway,
            &policy(),
        )
        .unwrap();
        assert_eq!(totals, OrderTotals { tax_rate: dec!(15), ..OrderTotals::zero() });
    }

    #[test]
    fn oversized_lines_are_rejected_instead_of_overflowing() {
        let err = compute_totals(
            &[PricedLine::new(1000, dec!(100000000000000000000000000))],
            None,
            PaymentMethod::Cash,
            OrderType::TakeAway,
            &policy(),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("too large")));
    }

    #[test]
    fn totals_beyond_the_money_column_are_rejected() {
        let lines = [PricedLine::new(2, dec!(9999999999.99))];
        let err = compute_totals(&lines, None, PaymentMethod::Card, OrderType::TakeAway, &policy());
        assert!(matches!(err, Err(ServiceError::ValidationError(_))));
    }
}
