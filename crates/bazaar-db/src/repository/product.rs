//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Create a product together with its image (one transaction)
//! - Detail reads joining image, category title and seller
//! - Paged listing with filter/sort allow-lists
//!
//! Deleting a product, or replacing its image, is a cascade, see
//! [`crate::cascade`].
//!
//! ## Product Details Join
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  products p ──► images i      (i.description, i.base64_string, ...)    │
//! │      │     ──► categories c  (c.title)                                 │
//! │      └─────► users u         (u.first_name, u.last_name, u.email)      │
//! │                                                                         │
//! │  All three joins are INNER: foreign keys guarantee the targets exist.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{FromRow, Sqlite, SqlitePool};
use tracing::{debug, info};

use bazaar_core::query::{parse_for, FilterSpec, PageSpec, SortSpec};
use bazaar_core::validation::{validate_image_data, validate_new_product, validate_product};
use bazaar_core::{Image, ImageData, ImageType, Page, Product, ProductDetails};

use crate::error::{DbError, DbResult};
use crate::query::fetch_page;
use crate::repository::image::ImageRepository;
use crate::store::{EntityStore, Table, UnitOfWork};

impl Table for Product {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [&'static str] = &[
        "category_id",
        "user_id",
        "image_id",
        "title",
        "description",
        "description_short",
        "label",
        "release_date",
        "price_cents",
    ];
    const CATEGORY_COLUMN: Option<&'static str> = Some("category_id");

    fn bind_columns<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.category_id)
            .bind(&self.user_id)
            .bind(&self.image_id)
            .bind(&self.title)
            .bind(&self.description)
            .bind(&self.description_short)
            .bind(&self.label)
            .bind(self.release_date)
            .bind(self.price_cents)
    }
}

/// Select list + joins shared by every product detail read.
pub(crate) const DETAILS_SELECT: &str = r#"
    SELECT
        p.id, p.category_id, p.user_id, p.image_id, p.title, p.description,
        p.description_short, p.label, p.release_date, p.price_cents,
        i.description AS image_description,
        i.base64_string AS image_base64_string,
        i.image_type AS image_type,
        c.title AS category_title,
        u.first_name AS seller_first_name,
        u.last_name AS seller_last_name,
        u.email AS seller_email
    FROM products p
    INNER JOIN images i ON i.id = p.image_id
    INNER JOIN categories c ON c.id = p.category_id
    INNER JOIN users u ON u.id = p.user_id
"#;

#[derive(FromRow)]
pub(crate) struct DetailsRow {
    #[sqlx(flatten)]
    product: Product,
    image_description: String,
    image_base64_string: String,
    image_type: ImageType,
    category_title: String,
    seller_first_name: String,
    seller_last_name: String,
    seller_email: String,
}

impl From<DetailsRow> for ProductDetails {
    fn from(row: DetailsRow) -> Self {
        let image = Image {
            id: row.product.image_id.clone(),
            description: row.image_description,
            base64_string: row.image_base64_string,
            image_type: row.image_type,
        };

        ProductDetails {
            product: row.product,
            image,
            category_title: row.category_title,
            seller_first_name: row.seller_first_name,
            seller_last_name: row.seller_last_name,
            seller_email: row.seller_email,
        }
    }
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.create_with_image(draft, cover).await?;
/// let details = repo.get_details(&product.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    store: EntityStore<Product>,
    images: ImageRepository,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository {
            store: EntityStore::new(pool.clone()),
            images: ImageRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        self.store.get_by_id(id).await
    }

    pub async fn exists(&self, id: &str) -> DbResult<bool> {
        self.store.exists(id).await
    }

    /// Stores `image`, points `product` at it and stores the product, in one
    /// transaction.
    ///
    /// ## Errors
    /// * `Validation` - bad product fields or image payload
    /// * `ForeignKeyViolation` - category or seller does not exist
    pub async fn create_with_image(&self, mut product: Product, image: ImageData) -> DbResult<Product> {
        validate_new_product(&product)?;
        validate_image_data(&image)?;

        debug!(title = %product.title, category_id = %product.category_id, "Creating product");

        let mut uow = UnitOfWork::begin(&self.pool).await?;

        let image = self.images.create_in(&mut uow, image).await?;
        product.image_id = image.id;
        let product = self.store.add_in(&mut uow, product).await?;

        uow.commit().await?;

        info!(id = %product.id, image_id = %product.image_id, "Product created");
        Ok(product)
    }

    /// Stores a product whose image already exists.
    ///
    /// ## Errors
    /// * `UniqueViolation` - the image already belongs to another product
    pub async fn add(&self, product: Product) -> DbResult<Product> {
        validate_product(&product)?;
        let image_id = product.image_id.clone();
        self.store.add(product).await.map_err(|e| image_taken(e, &image_id))
    }

    /// Persists every column of `product`.
    ///
    /// Changing image content goes through
    /// [`crate::cascade::CascadeOrchestrator::update_product_image`] instead.
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        validate_product(product)?;
        self.store
            .update(product)
            .await
            .map_err(|e| image_taken(e, &product.image_id))
    }

    pub async fn get_details(&self, id: &str) -> DbResult<Option<ProductDetails>> {
        let sql = format!("{DETAILS_SELECT} WHERE p.id = ?");

        let row = sqlx::query_as::<_, DetailsRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ProductDetails::from))
    }

    /// Lists product details ordered by title, optionally for one category.
    pub async fn list_details(&self, category_id: Option<&str>) -> DbResult<Vec<ProductDetails>> {
        let sql = format!("{DETAILS_SELECT} WHERE ?1 IS NULL OR p.category_id = ?1 ORDER BY p.title, p.id");

        let rows = sqlx::query_as::<_, DetailsRow>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ProductDetails::from).collect())
    }

    /// One page of products.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let page = db.products().list_paged(
    ///     Some(&FilterSpec::new("label", "Blue Note")),
    ///     Some(&SortSpec::new("release_date", SortDirection::Desc)),
    ///     PageSpec::new(1, 20)?,
    ///     Some(&jazz.id),
    /// ).await?;
    /// ```
    pub async fn list_paged(
        &self,
        filter: Option<&FilterSpec>,
        sort: Option<&SortSpec>,
        page: PageSpec,
        category_id: Option<&str>,
    ) -> DbResult<Page<Product>> {
        let query = parse_for::<Product>(filter, sort, page, category_id)?;
        fetch_page(&self.pool, &query).await
    }

    pub(crate) async fn list_by_category_in(
        &self,
        uow: &mut UnitOfWork,
        category_id: &str,
    ) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE category_id = ? ORDER BY id",
            Product::select_list()
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(category_id)
            .fetch_all(uow.conn())
            .await?;

        Ok(products)
    }

    pub(crate) async fn count_by_seller_in(&self, uow: &mut UnitOfWork, user_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(uow.conn())
            .await?;

        Ok(count)
    }
}

/// Names the image in the error when `products.image_id` is already taken.
fn image_taken(err: DbError, image_id: &str) -> DbError {
    match err {
        DbError::UniqueViolation { field, .. } if field == "products.image_id" => {
            DbError::duplicate("product image", image_id)
        }
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use bazaar_core::query::SortDirection;
    use bazaar_core::ErrorKind;

    #[tokio::test]
    async fn test_create_with_image_and_details() {
        let fx = testing::fixture().await;

        let product = fx.product("Kind of Blue", "Columbia").await;
        let details = fx.db.products().get_details(&product.id).await.unwrap().unwrap();

        assert_eq!(details.product, product);
        assert_eq!(details.image.id, product.image_id);
        assert_eq!(details.category_title, "Jazz");
        assert_eq!(details.seller_email, fx.seller.email);
    }

    #[tokio::test]
    async fn test_create_with_missing_category_rolls_back_image() {
        let fx = testing::fixture().await;

        let mut draft = fx.draft("Orphan", "Nowhere");
        draft.category_id = "missing".to_string();

        let err = fx
            .db
            .products()
            .create_with_image(draft, testing::image_data("orphan"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(fx.db.store::<Image>().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_image_cannot_be_shared() {
        let fx = testing::fixture().await;
        let first = fx.product("Kind of Blue", "Columbia").await;

        let mut draft = fx.draft("Kind of Blue (mono)", "Columbia");
        draft.image_id = first.image_id.clone();
        let err = fx.db.products().add(draft).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let mut second = fx.product("Blue Train", "Blue Note").await;
        second.image_id = first.image_id.clone();
        let err = fx.db.products().update(&second).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Both products keep their own image, so either can be deleted.
        fx.db.cascade().delete_product(&first.id).await.unwrap();
        assert!(!fx.db.images().exists(&first.image_id).await.unwrap());
        assert_eq!(fx.db.store::<Product>().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_with_existing_image() {
        let fx = testing::fixture().await;
        let cover = fx.db.images().create(testing::image_data("loose")).await.unwrap();

        let mut draft = fx.draft("Mingus Ah Um", "Columbia");
        draft.image_id = cover.id.clone();
        let product = fx.db.products().add(draft).await.unwrap();

        let details = fx.db.products().get_details(&product.id).await.unwrap().unwrap();
        assert_eq!(details.image.id, cover.id);
    }

    #[tokio::test]
    async fn test_negative_price_rejected() {
        let fx = testing::fixture().await;

        let mut draft = fx.draft("Free Lunch", "Nobody");
        draft.price_cents = -100;

        let err = fx
            .db
            .products()
            .create_with_image(draft, testing::image_data("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_list_paged_with_category_and_label() {
        let fx = testing::fixture().await;

        fx.product("Kind of Blue", "Columbia").await;
        fx.product("Blue Train", "Blue Note").await;
        fx.product("Speak No Evil", "Blue Note").await;

        let rock = fx.db.categories().create("Rock").await.unwrap();
        let mut draft = fx.draft("Blue Lines", "Blue Note");
        draft.category_id = rock.id.clone();
        fx.db
            .products()
            .create_with_image(draft, testing::image_data("lines"))
            .await
            .unwrap();

        let page = fx
            .db
            .products()
            .list_paged(
                Some(&FilterSpec::new("label", "BLUE NOTE")),
                Some(&SortSpec::new("title", SortDirection::Desc)),
                PageSpec::new(1, 5).unwrap(),
                Some(&fx.category.id),
            )
            .await
            .unwrap();

        let titles: Vec<_> = page.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Speak No Evil", "Blue Train"]);
        assert_eq!(page.total_items, 2);
        assert_eq!(page.page_count, 1);
    }

    #[tokio::test]
    async fn test_list_paged_release_date_range() {
        let fx = testing::fixture().await;

        // fixture release dates are 2000-01-01 plus one day per product
        fx.product("One", "L").await;
        fx.product("Two", "L").await;
        fx.product("Three", "L").await;

        let page = fx
            .db
            .products()
            .list_paged(
                Some(&FilterSpec::new("release_date", "2000-01-01..2000-01-02")),
                Some(&SortSpec::new("release_date", SortDirection::Asc)),
                PageSpec::default(),
                None,
            )
            .await
            .unwrap();

        let titles: Vec<_> = page.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
    }

    #[tokio::test]
    async fn test_list_details_by_category() {
        let fx = testing::fixture().await;

        fx.product("Blue Train", "Blue Note").await;
        fx.product("A Love Supreme", "Impulse!").await;

        let all = fx.db.products().list_details(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].product.title, "A Love Supreme");

        let jazz = fx.db.products().list_details(Some(&fx.category.id)).await.unwrap();
        assert_eq!(jazz.len(), 2);

        let none = fx.db.products().list_details(Some("missing")).await.unwrap();
        assert!(none.is_empty());
    }
}
