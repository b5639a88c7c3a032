use crate::{
    db::DbPool,
    entities::category::{self, Entity as CategoryEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct CategoryService {
    db_pool: Arc<DbPool>,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn ensure_unique_name(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = CategoryEntity::find().filter(category::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(category::Column::Id.ne(id));
        }
        let taken = query.count(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to check category name");
            ServiceError::DatabaseError(e)
        })?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: CreateCategoryRequest) -> Result<category::Model, ServiceError> {
        request.validate()?;
        let name = request.name.trim().to_string();
        self.ensure_unique_name(&name, None).await?;

        let now = Utc::now();
        let created = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(request.description),
            is_active: Set(request.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create category");
            ServiceError::DatabaseError(e)
        })?;

        info!(category_id = %created.id, "Category created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        CategoryEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, category_id = %id, "Failed to fetch category");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        search: Option<String>,
        active_only: bool,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<category::Model>, u64), ServiceError> {
        let mut query = CategoryEntity::find();
        if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(category::Column::Name.contains(term.trim()))
                    .add(category::Column::Description.contains(term.trim())),
            );
        }
        if active_only {
            query = query.filter(category::Column::IsActive.eq(true));
        }

        let paginator = query
            .order_by_asc(category::Column::Name)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count categories");
            ServiceError::DatabaseError(e)
        })?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list categories");
                ServiceError::DatabaseError(e)
            })?;
        Ok((items, total))
    }

    /// Active categories in till order.
    pub async fn list_active(&self) -> Result<Vec<category::Model>, ServiceError> {
        CategoryEntity::find()
            .filter(category::Column::IsActive.eq(true))
            .order_by_asc(category::Column::Name)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list active categories");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCategoryRequest,
    ) -> Result<category::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        let mut active = existing.into_active_model();

        if let Some(name) = request.name {
            let name = name.trim().to_string();
            self.ensure_unique_name(&name, Some(id)).await?;
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, category_id = %id, "Failed to update category");
            ServiceError::DatabaseError(e)
        })
    }

    /// Deletes an empty category.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        let products = ProductEntity::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, category_id = %id, "Failed to count category products");
                ServiceError::DatabaseError(e)
            })?;
        if products > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' still has {} product(s)",
                existing.name, products
            )));
        }

        CategoryEntity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, category_id = %id, "Failed to delete category");
                ServiceError::DatabaseError(e)
            })?;
        info!(category_id = %id, "Category deleted");
        Ok(())
    }
}
