//! # Wishlist Index
//!
//! User ↔ product association rows keyed by the `(user_id, product_id)`
//! pair.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  add_item(u, p)        product must exist, pair must be new            │
//! │  remove_item(u, p)     pair must exist                                 │
//! │                                                                         │
//! │  remove_all_by_user(u)     ◄── user deletion cascade                   │
//! │  remove_all_by_product(p)  ◄── product / category deletion cascade     │
//! │                                                                         │
//! │  A wishlist row is always removed BEFORE the product it points at.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use bazaar_core::{ProductDetails, ValidationError, WishlistItem};

use crate::error::{DbError, DbResult};
use crate::repository::product::{DetailsRow, DETAILS_SELECT};
use crate::store::UnitOfWork;

/// Wishlist association store.
///
/// ## Usage
/// ```rust,ignore
/// let wishlist = db.wishlist();
///
/// wishlist.add_item(&user.id, &product.id).await?;
/// let products = wishlist.list_by_user(&user.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct WishlistIndex {
    pool: SqlitePool,
}

impl WishlistIndex {
    pub fn new(pool: SqlitePool) -> Self {
        WishlistIndex { pool }
    }

    /// Adds `(user_id, product_id)`.
    ///
    /// ## Errors
    /// * `Validation` - the product does not exist
    /// * `UniqueViolation` - the pair already exists (the row is left as is)
    /// * `ForeignKeyViolation` - the user does not exist
    pub async fn add_item(&self, user_id: &str, product_id: &str) -> DbResult<WishlistItem> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::required("user_id").into());
        }
        if product_id.trim().is_empty() {
            return Err(ValidationError::required("product_id").into());
        }

        debug!(user_id = %user_id, product_id = %product_id, "Adding wishlist item");

        let mut uow = UnitOfWork::begin(&self.pool).await?;

        let product_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = ?)")
                .bind(product_id)
                .fetch_one(uow.conn())
                .await?;

        if !product_exists {
            warn!(product_id = %product_id, "Wishlist product does not exist");
            return Err(ValidationError::UnknownReference {
                field: "product_id".to_string(),
                value: product_id.to_string(),
            }
            .into());
        }

        if self.contains_in(&mut uow, user_id, product_id).await? {
            warn!(user_id = %user_id, product_id = %product_id, "Wishlist item already exists");
            return Err(DbError::duplicate(
                "wishlist item",
                format!("{user_id}/{product_id}"),
            ));
        }

        sqlx::query("INSERT INTO wishlist_items (user_id, product_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(product_id)
            .execute(uow.conn())
            .await?;

        uow.commit().await?;

        info!(user_id = %user_id, product_id = %product_id, "Wishlist item added");
        Ok(WishlistItem::new(user_id, product_id))
    }

    /// Removes `(user_id, product_id)`.
    ///
    /// ## Errors
    /// * `NotFound` - the pair does not exist
    pub async fn remove_item(&self, user_id: &str, product_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = ? AND product_id = ?")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "WishlistItem",
                format!("{user_id}/{product_id}"),
            ));
        }

        info!(user_id = %user_id, product_id = %product_id, "Wishlist item removed");
        Ok(())
    }

    pub async fn contains(&self, user_id: &str, product_id: &str) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM wishlist_items WHERE user_id = ? AND product_id = ?)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Products on a user's wishlist, with image and category joined,
    /// ordered by title.
    pub async fn list_by_user(&self, user_id: &str) -> DbResult<Vec<ProductDetails>> {
        let sql = format!(
            "{DETAILS_SELECT} INNER JOIN wishlist_items w ON w.product_id = p.id \
             WHERE w.user_id = ? ORDER BY p.title, p.id"
        );

        let rows = sqlx::query_as::<_, DetailsRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ProductDetails::from).collect())
    }

    /// Removes every wishlist row of a user. Returns the number removed.
    pub async fn remove_all_by_user(&self, user_id: &str) -> DbResult<u64> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let removed = self.remove_all_by_user_in(&mut uow, user_id).await?;
        uow.commit().await?;

        info!(user_id = %user_id, removed, "Wishlist cleared for user");
        Ok(removed)
    }

    /// Removes every wishlist row pointing at a product. Returns the number
    /// removed.
    pub async fn remove_all_by_product(&self, product_id: &str) -> DbResult<u64> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let removed = self.remove_all_by_product_in(&mut uow, product_id).await?;
        uow.commit().await?;

        info!(product_id = %product_id, removed, "Wishlist cleared for product");
        Ok(removed)
    }

    // =========================================================================
    // Unit-of-Work Operations
    // =========================================================================

    pub async fn contains_in(
        &self,
        uow: &mut UnitOfWork,
        user_id: &str,
        product_id: &str,
    ) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM wishlist_items WHERE user_id = ? AND product_id = ?)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(uow.conn())
        .await?;

        Ok(exists)
    }

    pub async fn remove_all_by_user_in(&self, uow: &mut UnitOfWork, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = ?")
            .bind(user_id)
            .execute(uow.conn())
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn remove_all_by_product_in(
        &self,
        uow: &mut UnitOfWork,
        product_id: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM wishlist_items WHERE product_id = ?")
            .bind(product_id)
            .execute(uow.conn())
            .await?;

        Ok(result.rows_affected())
    }
}
