//! # Category Repository
//!
//! Database operations for categories.
//!
//! ## Title Uniqueness
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Titles are unique under case-insensitive comparison:                   │
//! │                                                                         │
//! │  create("Jazz")                      ✓                                  │
//! │  create("JAZZ")                      ✗ Conflict                         │
//! │  rename(jazz.id, "jazz")             ✓ (own title, any case)            │
//! │  rename(blues.id, "Jazz")            ✗ Conflict                         │
//! │                                                                         │
//! │  Enforced twice: an explicit check for a readable error, and the       │
//! │  UNIQUE ... COLLATE NOCASE constraint for concurrent writers.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting a category is a cascade, see [`crate::cascade`].

use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{FromRow, Sqlite, SqlitePool};
use tracing::{debug, info, warn};

use bazaar_core::query::{parse_for, FilterSpec, PageSpec, SortSpec};
use bazaar_core::validation::validate_title;
use bazaar_core::{Category, CategorySummary, Page, Product};

use crate::error::{DbError, DbResult};
use crate::query::fetch_page;
use crate::store::{EntityStore, Table};

impl Table for Category {
    const TABLE: &'static str = "categories";
    const COLUMNS: &'static [&'static str] = &["title"];

    fn bind_columns<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query.bind(&self.title)
    }
}

#[derive(FromRow)]
struct SummaryRow {
    id: String,
    title: String,
    product_count: i64,
}

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
    store: EntityStore<Category>,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository {
            store: EntityStore::new(pool.clone()),
            pool,
        }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        self.store.get_by_id(id).await
    }

    /// Lists every category ordered by title.
    pub async fn list_all(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, title FROM categories ORDER BY title, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Whether a category other than `except_id` already uses `title`
    /// (case-insensitive).
    pub async fn title_exists(&self, title: &str, except_id: Option<&str>) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE title = ?1 AND id IS NOT ?2)",
        )
        .bind(title.trim())
        .bind(except_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Creates a category.
    ///
    /// ## Errors
    /// * `Validation` - empty or overlong title
    /// * `UniqueViolation` - title already used (case-insensitive)
    pub async fn create(&self, title: &str) -> DbResult<Category> {
        validate_title(title)?;
        let title = title.trim();

        if self.title_exists(title, None).await? {
            warn!(title = %title, "Category title already exists");
            return Err(DbError::duplicate("category title", title));
        }

        self.store.add(Category::new(title)).await
    }

    /// Renames a category. Renaming to its own title in any case succeeds.
    ///
    /// ## Errors
    /// * `NotFound` - no category with `id`
    /// * `UniqueViolation` - another category uses the title
    pub async fn rename(&self, id: &str, title: &str) -> DbResult<Category> {
        validate_title(title)?;
        let title = title.trim();

        debug!(id = %id, title = %title, "Renaming category");

        if self.title_exists(title, Some(id)).await? {
            warn!(id = %id, title = %title, "Category title already exists");
            return Err(DbError::duplicate("category title", title));
        }

        let category = Category {
            id: id.to_string(),
            title: title.to_string(),
        };
        self.store.update(&category).await?;

        info!(id = %id, title = %title, "Category renamed");
        Ok(category)
    }

    /// Lists categories with the number of products in each, ordered by title.
    pub async fn list_with_product_counts(&self) -> DbResult<Vec<CategorySummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT c.id, c.title, COUNT(p.id) AS product_count
            FROM categories c
            LEFT JOIN products p ON p.category_id = c.id
            GROUP BY c.id, c.title
            ORDER BY c.title, c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CategorySummary {
                category: Category {
                    id: row.id,
                    title: row.title,
                },
                product_count: row.product_count,
            })
            .collect())
    }

    /// Lists the products filed under a category, ordered by title.
    pub async fn products_of(&self, category_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE category_id = ? ORDER BY title, id",
            Product::select_list()
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// One page of categories, optionally filtered on title.
    pub async fn list_paged(
        &self,
        filter: Option<&FilterSpec>,
        sort: Option<&SortSpec>,
        page: PageSpec,
    ) -> DbResult<Page<Category>> {
        let query = parse_for::<Category>(filter, sort, page, None)?;
        fetch_page(&self.pool, &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bazaar_core::ErrorKind;

    async fn repo() -> CategoryRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().categories()
    }

    #[tokio::test]
    async fn test_duplicate_title_is_conflict() {
        let repo = repo().await;

        repo.create("Jazz").await.unwrap();
        let err = repo.create("JAZZ").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_to_own_title_any_case() {
        let repo = repo().await;

        let jazz = repo.create("Jazz").await.unwrap();
        let renamed = repo.rename(&jazz.id, "JAZZ").await.unwrap();
        assert_eq!(renamed.title, "JAZZ");

        let loaded = repo.get_by_id(&jazz.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "JAZZ");
    }

    #[tokio::test]
    async fn test_rename_to_other_title_is_conflict() {
        let repo = repo().await;

        repo.create("Jazz").await.unwrap();
        let blues = repo.create("Blues").await.unwrap();

        let err = repo.rename(&blues.id, "jazz").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_rename_missing_is_not_found() {
        let repo = repo().await;

        let err = repo.rename("missing", "Jazz").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_with_product_counts_empty() {
        let repo = repo().await;

        repo.create("Soul").await.unwrap();
        repo.create("Blues").await.unwrap();

        let summaries = repo.list_with_product_counts().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].category.title, "Blues");
        assert!(summaries.iter().all(|s| s.product_count == 0));
    }

    #[tokio::test]
    async fn test_list_paged() {
        let repo = repo().await;

        for title in ["Jazz", "Acid Jazz", "Soul", "Blues", "Free Jazz", "Funk"] {
            repo.create(title).await.unwrap();
        }

        let page = repo
            .list_paged(
                Some(&FilterSpec::new("title", "jazz")),
                None,
                PageSpec::new(1, 5).unwrap(),
            )
            .await
            .unwrap();

        let titles: Vec<_> = page.items.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Acid Jazz", "Free Jazz", "Jazz"]);
        assert_eq!(page.total_items, 3);

        let err = repo
            .list_paged(
                Some(&FilterSpec::new("id", "x")),
                None,
                PageSpec::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
