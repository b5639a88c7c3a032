use crate::{
    errors::ServiceError,
    services::adjustments::{AdjustmentFilter, AdjustmentService, AdjustmentStatement},
    services::audit::RequestContext,
    services::orders::{OrderDetail, OrderService},
    services::settings::{BusinessInfo, SettingsService},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Write as _;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Printer width in characters.
pub const RECEIPT_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Receipt {
    pub business: BusinessInfo,
    /// Present when the logo is switched on and one has been uploaded.
    pub logo_url: Option<String>,
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub order_type: String,
    pub payment_method: String,
    pub order_status: String,
    pub payment_status: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub service_charge: Decimal,
    pub delivery_charge: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
}

impl Receipt {
    pub fn from_order(detail: &OrderDetail, business: BusinessInfo, logo_url: Option<String>) -> Self {
        let order = &detail.order;
        Self {
            business,
            logo_url,
            order_number: order.order_number.clone(),
            created_at: order.created_at,
            order_type: order.order_type.clone(),
            payment_method: order.payment_method.clone(),
            order_status: order.order_status.clone(),
            payment_status: order.payment_status.clone(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            lines: detail
                .items
                .iter()
                .map(|i| ReceiptLine {
                    name: i.product_name.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                    total: i.total_price,
                })
                .collect(),
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            tax_rate: order.tax_rate,
            tax_amount: order.tax_amount,
            service_charge: order.service_charge,
            delivery_charge: order.delivery_charges,
            total: order.total_amount,
            notes: order.notes.clone(),
        }
    }

    fn money(&self, amount: Decimal) -> String {
        money(&self.business, amount)
    }

    /// Fixed-width layout for thermal printers.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let rule = "-".repeat(RECEIPT_WIDTH);
        let business = &self.business;

        push_business_header(&mut out, business);
        if !business.tax_number.trim().is_empty() {
            push_centered(&mut out, &format!("{} No: {}", business.tax_name, business.tax_number));
        }
        if !business.receipt_header.trim().is_empty() {
            push_centered(&mut out, &business.receipt_header);
        }
        push_line(&mut out, &rule);

        push_pair(&mut out, "Order", &self.order_number);
        push_pair(&mut out, "Date", &self.created_at.format("%Y-%m-%d %H:%M").to_string());
        push_pair(&mut out, "Type", &self.order_type);
        push_pair(&mut out, "Payment", &self.payment_method);
        if let Some(name) = self.customer_name.as_deref().filter(|n| !n.is_empty()) {
            push_pair(&mut out, "Customer", name);
        }
        if let Some(phone) = self.customer_phone.as_deref().filter(|p| !p.is_empty()) {
            push_pair(&mut out, "Phone", phone);
        }
        push_line(&mut out, &rule);

        for line in &self.lines {
            push_line(&mut out, &truncate(&line.name, RECEIPT_WIDTH));
            push_pair(
                &mut out,
                &format!("  {} x {}", line.quantity, self.money(line.unit_price)),
                &self.money(line.total),
            );
        }
        push_line(&mut out, &rule);

        push_pair(&mut out, "Subtotal", &self.money(self.subtotal));
        if !self.discount_amount.is_zero() {
            push_pair(&mut out, "Discount", &format!("-{}", self.money(self.discount_amount)));
        }
        if !self.tax_amount.is_zero() {
            let label = format!("{} ({}%)", business.tax_name, self.tax_rate.normalize());
            push_pair(&mut out, &label, &self.money(self.tax_amount));
        }
        if !self.service_charge.is_zero() {
            push_pair(&mut out, "Service charge", &self.money(self.service_charge));
        }
        if !self.delivery_charge.is_zero() {
            push_pair(&mut out, "Delivery", &self.money(self.delivery_charge));
        }
        push_line(&mut out, &"=".repeat(RECEIPT_WIDTH));
        push_pair(&mut out, "TOTAL", &self.money(self.total));
        push_pair(&mut out, "Status", &self.payment_status);
        push_line(&mut out, &rule);

        if let Some(notes) = self.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            push_line(&mut out, &truncate(&format!("Note: {}", notes), RECEIPT_WIDTH));
        }
        if !business.receipt_footer.trim().is_empty() {
            push_centered(&mut out, &business.receipt_footer);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AdjustmentReceiptLine {
    pub name: String,
    pub quantity: Option<i32>,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Printable statement of bills and advances over a period
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AdjustmentReceipt {
    pub business: BusinessInfo,
    pub logo_url: Option<String>,
    pub printed_at: DateTime<Utc>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub bills: Vec<AdjustmentReceiptLine>,
    pub advances: Vec<AdjustmentReceiptLine>,
    pub bill_total: Decimal,
    pub advance_total: Decimal,
    pub total: Decimal,
}

impl AdjustmentReceipt {
    pub fn from_statement(
        statement: &AdjustmentStatement,
        business: BusinessInfo,
        logo_url: Option<String>,
    ) -> Self {
        let report = &statement.report;
        Self {
            business,
            logo_url,
            printed_at: Utc::now(),
            from: report.from,
            to: report.to,
            bills: statement
                .bills
                .iter()
                .map(|b| AdjustmentReceiptLine {
                    name: b.name.clone(),
                    quantity: b.quantity,
                    amount: b.price,
                    created_at: b.created_at,
                })
                .collect(),
            advances: statement
                .advances
                .iter()
                .map(|a| AdjustmentReceiptLine {
                    name: a.name.clone(),
                    quantity: None,
                    amount: a.amount,
                    created_at: a.created_at,
                })
                .collect(),
            bill_total: report.bill_total,
            advance_total: report.advance_total,
            total: report.total,
        }
    }

    fn push_section(&self, out: &mut String, title: &str, lines: &[AdjustmentReceiptLine], total: Decimal) {
        push_line(out, &format!("{} ({})", title, lines.len()));
        for line in lines {
            let label = match line.quantity {
                Some(quantity) => format!("{} x{}", line.name, quantity),
                None => line.name.clone(),
            };
            push_pair(out, &format!("  {}", label), &money(&self.business, line.amount));
        }
        push_pair(out, &format!("{} total", title), &money(&self.business, total));
    }

    /// Same paper layout as the order receipt.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let rule = "-".repeat(RECEIPT_WIDTH);
        let business = &self.business;

        push_business_header(&mut out, business);
        if !business.receipt_header.trim().is_empty() {
            push_centered(&mut out, &business.receipt_header);
        }
        push_line(&mut out, &rule);
        push_centered(&mut out, "ADJUSTMENT REPORT");
        if let Some(from) = self.from {
            push_pair(&mut out, "From", &from.format("%Y-%m-%d %H:%M").to_string());
        }
        if let Some(to) = self.to {
            push_pair(&mut out, "To", &to.format("%Y-%m-%d %H:%M").to_string());
        }
        push_pair(&mut out, "Printed", &self.printed_at.format("%Y-%m-%d %H:%M").to_string());
        push_line(&mut out, &rule);

        self.push_section(&mut out, "Bills", &self.bills, self.bill_total);
        push_line(&mut out, &rule);
        self.push_section(&mut out, "Advances", &self.advances, self.advance_total);
        push_line(&mut out, &"=".repeat(RECEIPT_WIDTH));
        push_pair(&mut out, "TOTAL", &money(business, self.total));
        push_line(&mut out, &rule);

        if !business.receipt_footer.trim().is_empty() {
            push_centered(&mut out, &business.receipt_footer);
        }
        out
    }
}

fn money(business: &BusinessInfo, amount: Decimal) -> String {
    format!("{}{:.2}", business.currency_symbol, amount.round_dp(2))
}

fn push_business_header(out: &mut String, business: &BusinessInfo) {
    push_centered(out, &business.business_name);
    for extra in [&business.business_address, &business.business_phone] {
        if !extra.trim().is_empty() {
            push_centered(out, extra);
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

fn push_line(out: &mut String, text: &str) {
    let _ = writeln!(out, "{}", text);
}

fn push_centered(out: &mut String, text: &str) {
    let text = truncate(text.trim(), RECEIPT_WIDTH);
    let pad = (RECEIPT_WIDTH - text.chars().count()) / 2;
    let _ = writeln!(out, "{}{}", " ".repeat(pad), text);
}

/// Left label, right-aligned value; the label gives way when both do not fit.
fn push_pair(out: &mut String, left: &str, right: &str) {
    let right = truncate(right, RECEIPT_WIDTH);
    let room = RECEIPT_WIDTH.saturating_sub(right.chars().count() + 1);
    let left = truncate(left, room);
    let gap = RECEIPT_WIDTH - left.chars().count() - right.chars().count();
    let _ = writeln!(out, "{}{}{}", left, " ".repeat(gap), right);
}

#[derive(Clone)]
pub struct ReceiptService {
    orders: OrderService,
    adjustments: AdjustmentService,
    settings: SettingsService,
}

impl ReceiptService {
    pub fn new(orders: OrderService, adjustments: AdjustmentService, settings: SettingsService) -> Self {
        Self {
            orders,
            adjustments,
            settings,
        }
    }

    #[instrument(skip(self))]
    pub async fn receipt(&self, order_id: Uuid) -> Result<Receipt, ServiceError> {
        let detail = self.orders.get_order(order_id).await?;
        let business = self.settings.business_info().await?;
        let logo_url = self.settings.receipt_logo_url(&business).await?;
        Ok(Receipt::from_order(&detail, business, logo_url))
    }

    #[instrument(skip(self, ctx))]
    pub async fn adjustment_receipt(
        &self,
        filter: AdjustmentFilter,
        ctx: &RequestContext,
    ) -> Result<AdjustmentReceipt, ServiceError> {
        let statement = self.adjustments.statement(filter, ctx).await?;
        let business = self.settings.business_info().await?;
        let logo_url = self.settings.receipt_logo_url(&business).await?;
        Ok(AdjustmentReceipt::from_statement(&statement, business, logo_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn business() -> BusinessInfo {
        BusinessInfo {
            business_name: "My Restaurant".to_string(),
            business_address: "12 Food Street".to_string(),
            business_phone: String::new(),
            business_email: String::new(),
            receipt_header: String::new(),
            receipt_footer: "Thank you!".to_string(),
            show_logo: false,
            tax_name: "GST".to_string(),
            tax_number: String::new(),
            currency_symbol: "Rs ".to_string(),
            currency_code: "PKR".to_string(),
        }
    }

    fn receipt() -> Receipt {
        Receipt {
            business: business(),
            logo_url: None,
            order_number: "ORD-1A2B3C4D".to_string(),
            created_at: Utc::now(),
            order_type: "Take Away".to_string(),
            payment_method: "Cash".to_string(),
            order_status: "Pending".to_string(),
            payment_status: "Paid".to_string(),
            customer_name: Some("Ali".to_string()),
            customer_phone: None,
            lines: vec![ReceiptLine {
                name: "A very long menu item name that will not fit the paper".to_string(),
                quantity: 2,
                unit_price: dec!(500),
                total: dec!(1000),
            }],
            subtotal: dec!(1000),
            discount_amount: dec!(100),
            tax_rate: dec!(15),
            tax_amount: dec!(135),
            service_charge: Decimal::ZERO,
            delivery_charge: Decimal::ZERO,
            total: dec!(1035),
            notes: None,
        }
    }

    #[test]
    fn every_line_fits_the_paper() {
        let text = receipt().render_text();
        for line in text.lines() {
            assert!(line.chars().count() <= RECEIPT_WIDTH, "too wide: {:?}", line);
        }
    }

    fn adjustment_receipt() -> AdjustmentReceipt {
        let at = Utc::now();
        AdjustmentReceipt {
            business: business(),
            logo_url: Some("/api/v1/settings/logo".to_string()),
            printed_at: at,
            from: Some(at),
            to: None,
            bills: vec![
                AdjustmentReceiptLine {
                    name: "Vegetables from the Saturday market stall".to_string(),
                    quantity: Some(2),
                    amount: dec!(600),
                    created_at: at,
                },
                AdjustmentReceiptLine {
                    name: "Gas cylinder".to_string(),
                    quantity: None,
                    amount: dec!(120.5),
                    created_at: at,
                },
            ],
            advances: vec![AdjustmentReceiptLine {
                name: "Rider".to_string(),
                quantity: None,
                amount: dec!(500),
                created_at: at,
            }],
            bill_total: dec!(720.5),
            advance_total: dec!(500),
            total: dec!(1220.5),
        }
    }

    #[test]
    fn adjustment_receipt_lists_both_kinds_with_totals() {
        let text = adjustment_receipt().render_text();
        for line in text.lines() {
            assert!(line.chars().count() <= RECEIPT_WIDTH, "too wide: {:?}", line);
        }
        assert!(text.contains("ADJUSTMENT REPORT"));
        assert!(text.contains("Bills (2)"));
        assert!(text.contains("Advances (1)"));
        assert!(text.contains("Rs 720.50"));
        assert!(text.contains("Rs 1220.50"));
        assert!(!text.contains("To "));
        assert!(text.trim_end().ends_with("Thank you!"));
    }

    #[test]
    fn totals_are_printed_with_two_decimals() {
        let text = receipt().render_text();
        assert!(text.contains("Rs 1035.00"));
        assert!(text.contains("-Rs 100.00"));
        assert!(text.contains("GST (15%)"));
        assert!(!text.contains("Service charge"));
        assert!(text.trim_end().ends_with("Thank you!"));
    }
}
