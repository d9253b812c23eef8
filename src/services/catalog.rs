use crate::{
    db::DbPool,
    entities::product::{self, ActiveModel as ProductActiveModel, Entity as ProductEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_positive_price(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("range");
        err.message = Some("Price must be greater than 0".into());
        Err(err)
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Organic Cotton Tee",
    "description": "Soft, breathable, everyday tee",
    "price": "25.00",
    "sale_price": "19.99",
    "image_url": "https://cdn.example.com/tee.png",
    "category": "apparel",
    "stock": 120,
    "is_featured": true
}))]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom = "validate_positive_price")]
    pub price: Decimal,
    #[validate(custom = "validate_positive_price")]
    pub sale_price: Option<Decimal>,
    pub image_url: Option<String>,
    #[validate(length(max = 100, message = "Category is too long"))]
    pub category: Option<String>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[serde(default)]
    pub is_featured: bool,
}

/// Partial update; absent fields keep their current values.
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Product name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "validate_positive_price")]
    pub price: Option<Decimal>,
    #[validate(custom = "validate_positive_price")]
    pub sale_price: Option<Decimal>,
    pub image_url: Option<String>,
    #[validate(length(max = 100, message = "Category is too long"))]
    pub category: Option<String>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub stock: i32,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            sale_price: model.sale_price,
            image_url: model.image_url,
            category: model.category,
            stock: model.stock,
            is_featured: model.is_featured,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Catalog reads plus the admin-only writes.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let product_id = Uuid::new_v4();

        let active_model = ProductActiveModel {
            id: Set(product_id),
            name: Set(request.name),
            description: Set(request.description),
            price: Set(request.price),
            sale_price: Set(request.sale_price),
            image_url: Set(request.image_url),
            category: Set(request.category),
            stock: Set(request.stock),
            is_featured: Set(request.is_featured),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let model = active_model.insert(db).await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %product_id, "Product created");
        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        Ok(model.into())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(
        &self,
        product_id: Uuid,
    ) -> Result<Option<ProductResponse>, ServiceError> {
        let db = &*self.db_pool;

        let product = ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product");
                ServiceError::DatabaseError(e)
            })?;

        Ok(product.map(Into::into))
    }

    /// Newest-first listing with optional category and featured filters.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
        category: Option<String>,
        featured: Option<bool>,
    ) -> Result<ProductListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);

        let mut query = ProductEntity::find().order_by_desc(product::Column::CreatedAt);
        if let Some(category) = &category {
            query = query.filter(product::Column::Category.eq(category.clone()));
        }
        if let Some(featured) = featured {
            query = query.filter(product::Column::IsFeatured.eq(featured));
        }

        let paginator = query.paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count products");
            ServiceError::DatabaseError(e)
        })?;

        let products = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch products page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(ProductListResponse {
            products: products.into_iter().map(Into::into).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let product = ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound("Product".to_string()))?;

        let mut active_model: ProductActiveModel = product.into();
        if let Some(name) = request.name {
            active_model.name = Set(name);
        }
        if let Some(description) = request.description {
            active_model.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            active_model.price = Set(price);
        }
        if let Some(sale_price) = request.sale_price {
            active_model.sale_price = Set(Some(sale_price));
        }
        if let Some(image_url) = request.image_url {
            active_model.image_url = Set(Some(image_url));
        }
        if let Some(category) = request.category {
            active_model.category = Set(Some(category));
        }
        if let Some(stock) = request.stock {
            active_model.stock = Set(stock);
        }
        if let Some(is_featured) = request.is_featured {
            active_model.is_featured = Set(is_featured);
        }
        active_model.updated_at = Set(Some(Utc::now()));

        let model = active_model.update(db).await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to update product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %product_id, "Product updated");
        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        Ok(model.into())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let result = ProductEntity::delete_by_id(product_id)
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to delete product");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Product".to_string()));
        }

        info!(product_id = %product_id, "Product deleted");
        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        Ok(())
    }
}
