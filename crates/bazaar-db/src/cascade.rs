//! # Cascade Deletion Orchestrator
//!
//! Sequences multi-table deletions so no row is ever left pointing at a
//! deleted one.
//!
//! ## Category Deletion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   delete_category(id): ONE transaction                  │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    1. load category ───────────────── missing? → NotFound, ROLLBACK     │
//! │    2. load its products P1..Pn                                          │
//! │    3. for each Pi: DELETE wishlist_items WHERE product_id = Pi          │
//! │    4. for each Pi: DELETE products WHERE id = Pi                        │
//! │    5. DELETE the image of each Pi (images are never shared)             │
//! │    6. DELETE categories WHERE id = id                                   │
//! │  COMMIT ────────────────────────────── any step fails? → ROLLBACK all   │
//! │                                                                         │
//! │  Products go before their images: products.image_id is an immediate    │
//! │  foreign key, so the image row must outlive every product using it.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Image Replacement
//! ```text
//!   insert new image ──► repoint product ──► delete old image
//!   (product always references a live image at every step)
//! ```

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use bazaar_core::validation::validate_image_data;
use bazaar_core::{Category, Image, ImageData, Product, User, ValidationError};

use crate::error::{DbError, DbResult};
use crate::repository::image::ImageRepository;
use crate::repository::product::ProductRepository;
use crate::repository::wishlist::WishlistIndex;
use crate::store::{EntityStore, UnitOfWork};

/// Rows removed by one cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    pub products: u64,
    pub images: u64,
    pub wishlist_items: u64,
}

/// Runs every cascade inside a single unit of work.
#[derive(Debug, Clone)]
pub struct CascadeOrchestrator {
    pool: SqlitePool,
    categories: EntityStore<Category>,
    products: EntityStore<Product>,
    images: EntityStore<Image>,
    users: EntityStore<User>,
    product_repo: ProductRepository,
    image_repo: ImageRepository,
    wishlist: WishlistIndex,
    reject_empty_category: bool,
}

impl CascadeOrchestrator {
    pub fn new(pool: SqlitePool) -> Self {
        CascadeOrchestrator {
            categories: EntityStore::new(pool.clone()),
            products: EntityStore::new(pool.clone()),
            images: EntityStore::new(pool.clone()),
            users: EntityStore::new(pool.clone()),
            product_repo: ProductRepository::new(pool.clone()),
            image_repo: ImageRepository::new(pool.clone()),
            wishlist: WishlistIndex::new(pool.clone()),
            pool,
            reject_empty_category: false,
        }
    }

    /// When set, deleting a category that has no products is refused with a
    /// validation error.
    pub fn reject_empty_category(mut self, reject: bool) -> Self {
        self.reject_empty_category = reject;
        self
    }

    // =========================================================================
    // Category
    // =========================================================================

    /// Deletes a category with all its products, their images and every
    /// wishlist row pointing at those products.
    ///
    /// ## Errors
    /// * `NotFound` - no category with `category_id`
    /// * `Validation` - the category is empty and empty deletion is refused
    /// * anything raised by a step; nothing is deleted in that case
    pub async fn delete_category(&self, category_id: &str) -> DbResult<CascadeReport> {
        debug!(category_id = %category_id, "Deleting category (cascade)");

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let report = self.delete_category_in(&mut uow, category_id).await?;
        uow.commit().await?;

        info!(
            category_id = %category_id,
            products = report.products,
            images = report.images,
            wishlist_items = report.wishlist_items,
            "Category deleted"
        );
        Ok(report)
    }

    pub async fn delete_category_in(
        &self,
        uow: &mut UnitOfWork,
        category_id: &str,
    ) -> DbResult<CascadeReport> {
        self.categories.require_in(uow, category_id).await?;

        let products = self.product_repo.list_by_category_in(uow, category_id).await?;

        if products.is_empty() && self.reject_empty_category {
            warn!(category_id = %category_id, "Refusing to delete empty category");
            return Err(ValidationError::invalid_format(
                "category_id",
                "category has no products",
            )
            .into());
        }

        let mut report = CascadeReport::default();

        for product in &products {
            report.wishlist_items += self.wishlist.remove_all_by_product_in(uow, &product.id).await?;
        }

        for product in &products {
            self.products.delete_in(uow, &product.id).await?;
            report.products += 1;
        }

        for product in &products {
            self.images.delete_in(uow, &product.image_id).await?;
            report.images += 1;
        }

        self.categories.delete_in(uow, category_id).await?;

        Ok(report)
    }

    // =========================================================================
    // Product
    // =========================================================================

    /// Deletes a product, the wishlist rows pointing at it, then its image.
    ///
    /// ## Errors
    /// * `NotFound` - no product with `product_id`
    pub async fn delete_product(&self, product_id: &str) -> DbResult<CascadeReport> {
        debug!(product_id = %product_id, "Deleting product (cascade)");

        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let report = self.delete_product_in(&mut uow, product_id).await?;
        uow.commit().await?;

        info!(
            product_id = %product_id,
            wishlist_items = report.wishlist_items,
            "Product deleted"
        );
        Ok(report)
    }

    pub async fn delete_product_in(
        &self,
        uow: &mut UnitOfWork,
        product_id: &str,
    ) -> DbResult<CascadeReport> {
        let product = self.products.require_in(uow, product_id).await?;

        let wishlist_items = self.wishlist.remove_all_by_product_in(uow, product_id).await?;
        self.products.delete_in(uow, product_id).await?;
        self.images.delete_in(uow, &product.image_id).await?;

        Ok(CascadeReport {
            products: 1,
            images: 1,
            wishlist_items,
        })
    }

    /// Replaces a product's image content.
    ///
    /// Identical content (description, payload, type) is a no-op. Otherwise
    /// the new image is stored, the product repointed, and only then the old
    /// image deleted. Returns the product as stored afterwards.
    ///
    /// ## Errors
    /// * `Validation` - bad image payload (checked before the transaction)
    /// * `NotFound` - no product with `product_id`
    pub async fn update_product_image(&self, product_id: &str, data: ImageData) -> DbResult<Product> {
        validate_image_data(&data)?;

        let mut uow = UnitOfWork::begin(&self.pool).await?;

        let mut product = self.products.require_in(&mut uow, product_id).await?;
        let current = self.images.require_in(&mut uow, &product.image_id).await?;

        if current.same_content(&data) {
            debug!(product_id = %product_id, "Image unchanged");
            uow.rollback().await?;
            return Ok(product);
        }

        let replacement = self.image_repo.create_in(&mut uow, data).await?;
        product.image_id = replacement.id;
        self.products.update_in(&mut uow, &product).await?;
        self.images.delete_in(&mut uow, &current.id).await?;

        uow.commit().await?;

        info!(
            product_id = %product_id,
            old_image_id = %current.id,
            new_image_id = %product.image_id,
            "Product image replaced"
        );
        Ok(product)
    }

    // =========================================================================
    // User
    // =========================================================================

    /// Deletes a user and their wishlist rows. Returns the number of
    /// wishlist rows removed.
    ///
    /// ## Errors
    /// * `NotFound` - no user with `user_id`
    /// * `Integrity` - the user still sells products
    pub async fn delete_user(&self, user_id: &str) -> DbResult<u64> {
        debug!(user_id = %user_id, "Deleting user (cascade)");

        let mut uow = UnitOfWork::begin(&self.pool).await?;

        self.users.require_in(&mut uow, user_id).await?;

        let listed = self.product_repo.count_by_seller_in(&mut uow, user_id).await?;
        if listed > 0 {
            warn!(user_id = %user_id, listed, "User still sells products");
            return Err(DbError::integrity(format!(
                "user {user_id} still sells {listed} product(s)"
            )));
        }

        let removed = self.wishlist.remove_all_by_user_in(&mut uow, user_id).await?;
        self.users.delete_in(&mut uow, user_id).await?;

        uow.commit().await?;

        info!(user_id = %user_id, wishlist_items = removed, "User deleted");
        Ok(removed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
