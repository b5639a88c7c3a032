use crate::{
    db::{self, DbPool},
    entities::category::Entity as CategoryEntity,
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{self, Event, EventSender},
    services::audit::{self, actions, RequestContext},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Instant};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Rejects anything but the supported image formats.
pub fn validate_image(content_type: &str, bytes: &[u8]) -> Result<String, ServiceError> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !ALLOWED_IMAGE_TYPES.contains(&normalized.as_str()) {
        return Err(ServiceError::ValidationError(format!(
            "Unsupported image type '{}'; use PNG, JPEG, GIF or WebP",
            content_type
        )));
    }
    if bytes.is_empty() {
        return Err(ServiceError::ValidationError("Image body is empty".to_string()));
    }
    Ok(normalized)
}

/// Strong ETag over the image bytes.
pub fn image_etag(bytes: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(bytes)))
}

/// Stored image with its cache validator
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub etag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Product name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom = "crate::entities::validate_non_negative")]
    pub price: Decimal,
    #[validate(custom = "crate::entities::validate_non_negative")]
    pub cost_price: Option<Decimal>,
    #[validate(length(max = 100))]
    pub barcode: Option<String>,
    #[validate(length(max = 50))]
    pub sku: Option<String>,
    #[validate(range(min = 0, message = "Stock quantity cannot be negative"))]
    pub stock_quantity: Option<i32>,
    pub running_item: Option<bool>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "Product name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom = "crate::entities::validate_non_negative")]
    pub price: Option<Decimal>,
    #[validate(custom = "crate::entities::validate_non_negative")]
    pub cost_price: Option<Decimal>,
    #[validate(length(max = 100))]
    pub barcode: Option<String>,
    #[validate(length(max = 50))]
    pub sku: Option<String>,
    pub running_item: Option<bool>,
    pub is_available: Option<bool>,
}

/// Product filters for the list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub available_only: bool,
    pub include_archived: bool,
}

/// What a delete request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    Archived,
}

#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

fn search_condition(term: &str) -> Condition {
    Condition::any()
        .add(product::Column::Name.contains(term))
        .add(product::Column::Barcode.contains(term))
        .add(product::Column::Sku.contains(term))
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn ensure_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        let found = CategoryEntity::find_by_id(category_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %category_id, "Failed to fetch category");
                ServiceError::DatabaseError(e)
            })?;
        if found.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Category {} does not exist",
                category_id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: CreateProductRequest) -> Result<product::Model, ServiceError> {
        request.validate()?;
        self.ensure_category(request.category_id).await?;

        let now = Utc::now();
        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(request.category_id),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            price: Set(request.price),
            cost_price: Set(request.cost_price),
            barcode: Set(request.barcode),
            sku: Set(request.sku),
            stock_quantity: Set(request.stock_quantity.unwrap_or(0)),
            running_item: Set(request.running_item.unwrap_or(false)),
            is_available: Set(request.is_available.unwrap_or(true)),
            is_archived: Set(false),
            image: Set(None),
            image_content_type: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %id, "Failed to fetch product");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ProductFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut query = ProductEntity::find();
        if !filter.include_archived {
            query = query.filter(product::Column::IsArchived.eq(false));
        }
        if filter.available_only {
            query = query.filter(product::Column::IsAvailable.eq(true));
        }
        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(search_condition(term));
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count products");
            ServiceError::DatabaseError(e)
        })?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list products");
                ServiceError::DatabaseError(e)
            })?;
        Ok((items, total))
    }

    /// Name, barcode or SKU match, archived products excluded.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str, limit: u64) -> Result<Vec<product::Model>, ServiceError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        ProductEntity::find()
            .filter(product::Column::IsArchived.eq(false))
            .filter(search_condition(term))
            .order_by_asc(product::Column::Name)
            .limit(limit)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to search products");
                ServiceError::DatabaseError(e)
            })
    }

    pub async fn by_category(&self, category_id: Uuid) -> Result<Vec<product::Model>, ServiceError> {
        ProductEntity::find()
            .filter(product::Column::CategoryId.eq(category_id))
            .filter(product::Column::IsArchived.eq(false))
            .order_by_asc(product::Column::Name)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %category_id, "Failed to list products by category");
                ServiceError::DatabaseError(e)
            })
    }

    /// Products the till can sell right now.
    pub async fn available(&self) -> Result<Vec<product::Model>, ServiceError> {
        ProductEntity::find()
            .filter(product::Column::IsAvailable.eq(true))
            .filter(product::Column::IsArchived.eq(false))
            .filter(
                Condition::any()
                    .add(product::Column::RunningItem.eq(true))
                    .add(product::Column::StockQuantity.gt(0)),
            )
            .order_by_asc(product::Column::Name)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list available products");
                ServiceError::DatabaseError(e)
            })
    }

    /// Stock-tracked products below `threshold`.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<product::Model>, ServiceError> {
        ProductEntity::find()
            .filter(product::Column::RunningItem.eq(false))
            .filter(product::Column::IsArchived.eq(false))
            .filter(product::Column::StockQuantity.lt(threshold))
            .order_by_asc(product::Column::StockQuantity)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, threshold, "Failed to list low stock products");
                ServiceError::DatabaseError(e)
            })
    }

    pub async fn count_low_stock(&self, threshold: i32) -> Result<u64, ServiceError> {
        ProductEntity::find()
            .filter(product::Column::RunningItem.eq(false))
            .filter(product::Column::IsArchived.eq(false))
            .filter(product::Column::StockQuantity.lt(threshold))
            .count(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to count low stock products");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        if let Some(category_id) = request.category_id {
            self.ensure_category(category_id).await?;
        }

        let mut active = existing.into_active_model();
        if let Some(category_id) = request.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        if let Some(cost_price) = request.cost_price {
            active.cost_price = Set(Some(cost_price));
        }
        if let Some(barcode) = request.barcode {
            active.barcode = Set(Some(barcode));
        }
        if let Some(sku) = request.sku {
            active.sku = Set(Some(sku));
        }
        if let Some(running_item) = request.running_item {
            active.running_item = Set(running_item);
        }
        if let Some(is_available) = request.is_available {
            active.is_available = Set(is_available);
        }

        active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, product_id = %id, "Failed to update product");
            ServiceError::DatabaseError(e)
        })
    }

    /// Sets an absolute stock level.
    #[instrument(skip(self, ctx))]
    pub async fn update_stock(
        &self,
        id: Uuid,
        quantity: i32,
        low_stock_threshold: i32,
        ctx: &RequestContext,
    ) -> Result<product::Model, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Stock quantity cannot be negative".to_string(),
            ));
        }

        let started = Instant::now();
        let txn = db::begin(&self.db_pool, "products.update_stock").await?;
        let existing = ProductEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %id, "Failed to lock product");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

        let old_quantity = existing.stock_quantity;
        let mut active = existing.into_active_model();
        active.stock_quantity = Set(quantity);
        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, product_id = %id, "Failed to update stock");
            ServiceError::DatabaseError(e)
        })?;
        audit::record(
            &txn,
            ctx,
            actions::STOCK_UPDATE,
            "product",
            Some(id),
            Some(format!("{} -> {}", old_quantity, quantity)),
        )
        .await?;
        db::commit(txn, "products.update_stock", started).await?;

        let mut pending = vec![Event::StockAdjusted {
            product_id: id,
            old_quantity,
            new_quantity: quantity,
            reason: "manual".to_string(),
        }];
        if !updated.running_item && quantity < low_stock_threshold {
            pending.push(Event::LowStock {
                product_id: id,
                name: updated.name.clone(),
                stock_quantity: quantity,
                threshold: low_stock_threshold,
            });
        }
        events::publish_all(self.event_sender.as_deref(), pending).await;

        Ok(updated)
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn set_image(
        &self,
        id: Uuid,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<product::Model, ServiceError> {
        let content_type = validate_image(content_type, &bytes)?;
        let existing = self.get(id).await?;
        let mut active = existing.into_active_model();
        active.image = Set(Some(bytes));
        active.image_content_type = Set(Some(content_type));
        active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, product_id = %id, "Failed to store product image");
            ServiceError::DatabaseError(e)
        })
    }

    pub async fn get_image(&self, id: Uuid) -> Result<StoredImage, ServiceError> {
        let existing = self.get(id).await?;
        match (existing.image, existing.image_content_type) {
            (Some(bytes), Some(content_type)) if !bytes.is_empty() => Ok(StoredImage {
                etag: image_etag(&bytes),
                content_type,
                bytes,
            }),
            _ => Err(ServiceError::NotFound(format!(
                "Product {} has no image",
                id
            ))),
        }
    }

    pub async fn delete_image(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        let existing = self.get(id).await?;
        if !existing.has_image() {
            return Err(ServiceError::NotFound(format!(
                "Product {} has no image",
                id
            )));
        }
        let mut active = existing.into_active_model();
        active.image = Set(None);
        active.image_content_type = Set(None);
        active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, product_id = %id, "Failed to remove product image");
            ServiceError::DatabaseError(e)
        })
    }

    /// Deletes a product, or archives it when orders reference it.
    #[instrument(skip(self, ctx))]
    pub async fn delete(&self, id: Uuid, ctx: &RequestContext) -> Result<DeleteOutcome, ServiceError> {
        let existing = self.get(id).await?;
        let db = &*self.db_pool;
        let references = OrderItemEntity::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %id, "Failed to count order references");
                ServiceError::DatabaseError(e)
            })?;

        if references > 0 {
            let name = existing.name.clone();
            let mut active = existing.into_active_model();
            active.is_available = Set(false);
            active.is_archived = Set(true);
            active.update(db).await.map_err(|e| {
                error!(error = %e, product_id = %id, "Failed to archive product");
                ServiceError::DatabaseError(e)
            })?;
            audit::record(db, ctx, actions::PRODUCT_ARCHIVE, "product", Some(id), Some(name)).await?;
            info!(product_id = %id, references, "Product archived instead of deleted");
            return Ok(DeleteOutcome::Archived);
        }

        ProductEntity::delete_by_id(id).exec(db).await.map_err(|e| {
            error!(error = %e, product_id = %id, "Failed to delete product");
            ServiceError::DatabaseError(e)
        })?;
        audit::record(
            db,
            ctx,
            actions::PRODUCT_DELETE,
            "product",
            Some(id),
            Some(existing.name),
        )
        .await?;
        info!(product_id = %id, "Product deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_types_are_restricted() {
        assert_eq!(
            validate_image("image/PNG; charset=binary", b"\x89PNG").unwrap(),
            "image/png"
        );
        assert!(validate_image("image/svg+xml", b"<svg/>").is_err());
        assert!(validate_image("image/jpeg", b"").is_err());
    }

    #[test]
    fn etag_is_stable_and_quoted() {
        let a = image_etag(b"abc");
        assert_eq!(a, image_etag(b"abc"));
        assert_ne!(a, image_etag(b"abd"));
        assert!(a.starts_with('"') && a.ends_with('"'));
        assert_eq!(a.len(), 66);
    }
}
