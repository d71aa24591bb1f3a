//! Product catalog collaborator.
//!
//! Catalog management lives outside the core. The cart and checkout only need
//! to read product snapshots and move stock, which is modelled here as an
//! atomic counter per product so concurrent checkouts can never oversell.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use document_store::{CounterBounds, CounterKey, DocumentStore, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::error::{DomainError, Result};
use crate::repository::Repository;

/// A sellable product as the core sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub image_url: Option<String>,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    version: Version,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        let id = id.into();
        Self {
            sku: id.clone(),
            id: ProductId::new(id),
            name: name.into(),
            image_url: None,
            price,
            discount_price: None,
            is_active: true,
            created_at: Utc::now(),
            version: Version::initial(),
        }
    }

    pub fn with_discount_price(mut self, discount_price: Money) -> Self {
        self.discount_price = Some(discount_price);
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Price a customer pays per unit.
    pub fn unit_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }
}

impl Aggregate for Product {
    fn aggregate_type() -> &'static str {
        "products"
    }

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Trait for product lookups and stock movements.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Looks a product up. Inactive products are returned as stored.
    async fn product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Units currently on hand.
    async fn available_stock(&self, id: &ProductId) -> Result<u32>;

    /// Whether `quantity` units are on hand right now (advisory).
    async fn check_availability(&self, id: &ProductId, quantity: u32) -> Result<bool> {
        Ok(self.available_stock(id).await? >= quantity)
    }

    /// Atomically takes `quantity` units. Returns false, leaving stock
    /// untouched, if fewer are on hand.
    async fn decrement_stock(&self, id: &ProductId, quantity: u32) -> Result<bool>;

    /// Atomically puts `quantity` units back.
    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<()>;
}

/// Catalog backed by the document store.
pub struct StoreCatalog<S: DocumentStore> {
    products: Repository<S, Product>,
}

impl<S: DocumentStore + Clone> Clone for StoreCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            products: self.products.clone(),
        }
    }
}

impl<S: DocumentStore> StoreCatalog<S> {
    /// Creates a catalog over the given store.
    pub fn new(store: S) -> Self {
        Self {
            products: Repository::new(store),
        }
    }

    fn stock_key(id: &ProductId) -> CounterKey {
        CounterKey::new(Product::aggregate_type(), id.as_str(), "stock")
    }

    /// Stores a product and sets its stock level.
    pub async fn register(&self, mut product: Product, stock: u32) -> Result<Product> {
        self.products
            .store()
            .set_counter(&Self::stock_key(&product.id), i64::from(stock))
            .await?;
        if let Some(existing) = self.products.load(product.id.as_str()).await? {
            product.set_version(existing.version());
        }
        self.products.save(&mut product).await?;
        Ok(product)
    }
}

#[async_trait]
impl<S: DocumentStore> ProductCatalog for StoreCatalog<S> {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>> {
        self.products.load(id.as_str()).await
    }

    async fn available_stock(&self, id: &ProductId) -> Result<u32> {
        let stock = self
            .products
            .store()
            .get_counter(&Self::stock_key(id))
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        Ok(u32::try_from(stock.max(0)).unwrap_or(u32::MAX))
    }

    async fn decrement_stock(&self, id: &ProductId, quantity: u32) -> Result<bool> {
        let updated = self
            .products
            .store()
            .adjust_counter(
                &Self::stock_key(id),
                -i64::from(quantity),
                CounterBounds::non_negative(),
            )
            .await?;
        Ok(updated.is_some())
    }

    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<()> {
        self.products
            .store()
            .adjust_counter(
                &Self::stock_key(id),
                i64::from(quantity),
                CounterBounds::unbounded(),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use document_store::InMemoryDocumentStore;

    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let catalog = StoreCatalog::new(InMemoryDocumentStore::new());
        catalog
            .register(
                Product::new("SKU-1", "Desk Lamp", Money::from_major(100))
                    .with_discount_price(Money::from_major(80)),
                5,
            )
            .await
            .unwrap();

        let id = ProductId::new("SKU-1");
        let product = catalog.product(&id).await.unwrap().unwrap();
        assert_eq!(product.unit_price(), Money::from_major(80));
        assert_eq!(catalog.available_stock(&id).await.unwrap(), 5);
        assert!(catalog.check_availability(&id, 5).await.unwrap());
        assert!(!catalog.check_availability(&id, 6).await.unwrap());
    }

    #[tokio::test]
    async fn test_reregistering_resets_stock() {
        let catalog = StoreCatalog::new(InMemoryDocumentStore::new());
        let product = Product::new("SKU-1", "Desk Lamp", Money::from_major(100));
        catalog.register(product.clone(), 5).await.unwrap();
        catalog.register(product, 9).await.unwrap();

        assert_eq!(catalog.available_stock(&ProductId::new("SKU-1")).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_stock_movements() {
        let catalog = StoreCatalog::new(InMemoryDocumentStore::new());
        catalog
            .register(Product::new("SKU-1", "Desk Lamp", Money::from_major(100)), 3)
            .await
            .unwrap();
        let id = ProductId::new("SKU-1");

        assert!(catalog.decrement_stock(&id, 2).await.unwrap());
        assert!(!catalog.decrement_stock(&id, 2).await.unwrap());
        assert_eq!(catalog.available_stock(&id).await.unwrap(), 1);

        catalog.increment_stock(&id, 2).await.unwrap();
        assert_eq!(catalog.available_stock(&id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let catalog = StoreCatalog::new(InMemoryDocumentStore::new());
        let id = ProductId::new("SKU-404");
        assert!(catalog.product(&id).await.unwrap().is_none());
        assert!(matches!(
            catalog.available_stock(&id).await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
