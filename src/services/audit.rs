use crate::{
    db::DbPool,
    entities::audit_log::{self, Entity as AuditLogEntity},
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

pub mod actions {
    pub const ORDER_CREATE: &str = "order.create";
    pub const ORDER_UPDATE: &str = "order.update";
    pub const ORDER_CANCEL: &str = "order.cancel";
    pub const ORDER_PAY: &str = "order.pay";
    pub const ORDER_COMPLETE: &str = "order.complete";
    pub const SETTINGS_UPDATE: &str = "settings.update";
    pub const SETTINGS_DELETE: &str = "settings.delete";
    pub const END_DAY_RUN: &str = "end_day.run";
    pub const USER_CREATE: &str = "user.create";
    pub const PRODUCT_DELETE: &str = "product.delete";
    pub const PRODUCT_ARCHIVE: &str = "product.archive";
    pub const STOCK_UPDATE: &str = "product.stock_update";
    pub const BILL_DELETE: &str = "bill_adjustment.delete";
}

/// Who is acting and where the request came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub user_id: Option<Uuid>,
    pub is_admin: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Context for work started outside HTTP (CLI, startup).
    pub fn system() -> Self {
        Self {
            is_admin: true,
            ..Default::default()
        }
    }
}

/// Writes one audit row on `conn`, which may be a transaction.
pub async fn record<C>(
    conn: &C,
    ctx: &RequestContext,
    action: &str,
    entity: &str,
    entity_id: Option<Uuid>,
    details: Option<String>,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let row = audit_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(ctx.user_id),
        action: Set(action.to_string()),
        entity: Set(entity.to_string()),
        entity_id: Set(entity_id),
        details: Set(details),
        ip_address: Set(ctx.ip_address.clone()),
        user_agent: Set(ctx.user_agent.clone()),
        created_at: Set(chrono::Utc::now()),
    };

    row.insert(conn).await.map_err(|e| {
        error!(error = %e, action, entity, "Failed to write audit log");
        ServiceError::DatabaseError(e)
    })?;
    Ok(())
}

#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Newest first, optionally narrowed to one entity type or user.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        entity: Option<String>,
        user_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<audit_log::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let mut query = AuditLogEntity::find();
        if let Some(entity) = entity {
            query = query.filter(audit_log::Column::Entity.eq(entity));
        }
        if let Some(user_id) = user_id {
            query = query.filter(audit_log::Column::UserId.eq(user_id));
        }

        let paginator = query
            .order_by_desc(audit_log::Column::CreatedAt)
            .paginate(db, limit);
        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count audit logs");
            ServiceError::DatabaseError(e)
        })?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page, "Failed to fetch audit logs");
                ServiceError::DatabaseError(e)
            })?;

        Ok((rows, total))
    }
}
