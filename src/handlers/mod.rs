pub mod adjustments;
pub mod audit;
pub mod auth;
pub mod categories;
pub mod common;
pub mod discounts;
pub mod end_day;
pub mod orders;
pub mod pos;
pub mod products;
pub mod reports;
pub mod settings;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        adjustments::AdjustmentService, audit::AuditService, categories::CategoryService,
        discounts::DiscountService, end_day::EndDayService, orders::OrderService,
        products::ProductService, receipts::ReceiptService, reports::ReportService,
        settings::SettingsService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub discounts: Arc<DiscountService>,
    pub orders: Arc<OrderService>,
    pub receipts: Arc<ReceiptService>,
    pub settings: Arc<SettingsService>,
    pub adjustments: Arc<AdjustmentService>,
    pub end_day: Arc<EndDayService>,
    pub reports: Arc<ReportService>,
    pub audit: Arc<AuditService>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        config: Arc<AppConfig>,
        auth: Arc<AuthService>,
    ) -> Self {
        let settings = SettingsService::new(db_pool.clone(), event_sender.clone(), config);
        let products = ProductService::new(db_pool.clone(), event_sender.clone());
        let orders = OrderService::new(db_pool.clone(), event_sender.clone(), settings.clone());
        let adjustments = AdjustmentService::new(db_pool.clone());
        let receipts = ReceiptService::new(orders.clone(), adjustments.clone(), settings.clone());
        let reports = ReportService::new(db_pool.clone(), products.clone(), settings.clone());

        Self {
            categories: Arc::new(CategoryService::new(db_pool.clone())),
            discounts: Arc::new(DiscountService::new(db_pool.clone())),
            adjustments: Arc::new(adjustments),
            end_day: Arc::new(EndDayService::new(db_pool.clone(), event_sender)),
            audit: Arc::new(AuditService::new(db_pool)),
            products: Arc::new(products),
            orders: Arc::new(orders),
            receipts: Arc::new(receipts),
            reports: Arc::new(reports),
            settings: Arc::new(settings),
            auth,
        }
    }
}
