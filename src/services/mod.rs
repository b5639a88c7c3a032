// Order total engine and stock planning (pure)
pub mod pricing;
pub mod stock;

// Catalog
pub mod categories;
pub mod products;

// Sales
pub mod discounts;
pub mod orders;
pub mod receipts;

// Back office
pub mod adjustments;
pub mod audit;
pub mod end_day;
pub mod reports;
pub mod settings;
