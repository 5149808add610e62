//! # SQL Paged Query Composer
//!
//! Turns a validated [`PagedQuery`] into a COUNT statement and a page
//! statement.
//!
//! ## Composition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PagedQuery<ProductField>                                               │
//! │    category_id = "c1"                                                   │
//! │    filter      = Title contains "blue"                                  │
//! │    sort        = Price DESC, page 2 of 10                               │
//! │                                                                         │
//! │  SELECT COUNT(*) FROM products                                          │
//! │   WHERE category_id = ? AND instr(lower(title), ?) > 0                  │
//! │                                                                         │
//! │  SELECT id, ... FROM products                                           │
//! │   WHERE category_id = ? AND instr(lower(title), ?) > 0                  │
//! │   ORDER BY price_cents COLLATE BINARY DESC, id ASC                      │
//! │   LIMIT ? OFFSET ?                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Column names come only from [`SqlField::column`]; every caller-supplied
//! value is a bound parameter. `instr`/`lower` fold ASCII only and
//! `COLLATE BINARY` overrides the NOCASE column collations, matching the
//! in-memory evaluator in `bazaar_core::query`.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use bazaar_core::query::{CategoryField, FilterValue, PagedQuery, ProductField, QueryField};
use bazaar_core::{Page, ValidationError};

use crate::error::DbResult;
use crate::store::Table;

/// A query field backed by a table column.
pub trait SqlField: QueryField {
    fn column(&self) -> &'static str;
}

impl SqlField for ProductField {
    fn column(&self) -> &'static str {
        match self {
            ProductField::Title => "title",
            ProductField::Description => "description",
            ProductField::DescriptionShort => "description_short",
            ProductField::Label => "label",
            ProductField::ReleaseDate => "release_date",
            ProductField::Price => "price_cents",
        }
    }
}

impl SqlField for CategoryField {
    fn column(&self) -> &'static str {
        match self {
            CategoryField::Title => "title",
        }
    }
}

fn push_where<'a, F: SqlField>(
    builder: &mut QueryBuilder<'a, Sqlite>,
    query: &PagedQuery<F>,
    category_column: Option<&'static str>,
) {
    let mut clause = " WHERE ";

    if let (Some(id), Some(column)) = (&query.category_id, category_column) {
        builder.push(clause).push(column).push(" = ").push_bind(id.clone());
        clause = " AND ";
    }

    if let Some(filter) = &query.filter {
        let column = filter.field.column();
        builder.push(clause);

        match &filter.value {
            FilterValue::Contains(needle) => {
                builder
                    .push("instr(lower(")
                    .push(column)
                    .push("), ")
                    .push_bind(needle.clone())
                    .push(") > 0");
            }
            FilterValue::Equals(value) => {
                builder
                    .push("lower(")
                    .push(column)
                    .push(") = ")
                    .push_bind(value.clone());
            }
            FilterValue::DateRange(from, to) => {
                builder
                    .push(column)
                    .push(" BETWEEN ")
                    .push_bind(*from)
                    .push(" AND ")
                    .push_bind(*to);
            }
        }
    }
}

/// Runs `query` against `T`'s table.
///
/// ## Errors
/// * `Validation` - a category pre-filter on an entity without a category
pub async fn fetch_page<T>(pool: &SqlitePool, query: &PagedQuery<T::Field>) -> DbResult<Page<T>>
where
    T: Table + bazaar_core::query::Pageable,
    T::Field: SqlField,
{
    if query.category_id.is_some() && T::CATEGORY_COLUMN.is_none() {
        return Err(ValidationError::NotAllowed {
            field: "category_id".to_string(),
            allowed: Vec::new(),
        }
        .into());
    }

    debug!(
        table = T::TABLE,
        sort = query.sort.name(),
        page = query.page.page,
        items_per_page = query.page.items_per_page,
        "Fetching page"
    );

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
    count.push(T::TABLE);
    push_where(&mut count, query, T::CATEGORY_COLUMN);

    let total: i64 = count.build_query_scalar::<i64>().fetch_one(pool).await?;

    let mut select = QueryBuilder::<Sqlite>::new("SELECT ");
    select.push(T::select_list()).push(" FROM ").push(T::TABLE);
    push_where(&mut select, query, T::CATEGORY_COLUMN);
    select
        .push(" ORDER BY ")
        .push(query.sort.column())
        .push(" COLLATE BINARY ")
        .push(query.direction.as_sql())
        .push(", id ASC LIMIT ")
        .push_bind(query.page.items_per_page as i64)
        .push(" OFFSET ")
        .push_bind(query.page.offset() as i64);

    let items: Vec<T> = select.build_query_as::<T>().fetch_all(pool).await?;

    debug!(total, returned = items.len(), "Page fetched");
    Ok(Page::new(items, query.page, total as u64))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::query::{paginate, parse_for, FilterSpec, PageSpec, SortDirection, SortSpec};
    use bazaar_core::{Category, ErrorKind, Product};

    use crate::testing;
    use crate::{Database, DbConfig};

    const TITLES: [&str; 7] = ["Jazz", "blues", "Soul", "Acid Jazz", "Free Jazz", "Ambient", "JAZZ fusion"];

    async fn seeded() -> (Database, Vec<Category>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.store::<Category>();

        let mut all = Vec::new();
        for title in TITLES {
            all.push(store.add(Category::new(title)).await.unwrap());
        }
        (db, all)
    }

    #[tokio::test]
    async fn test_sql_matches_in_memory() {
        let (db, all) = seeded().await;

        let cases = [
            (None, None, PageSpec::new(1, 5).unwrap()),
            (None, None, PageSpec::new(2, 5).unwrap()),
            (Some(FilterSpec::new("title", "JAZZ")), None, PageSpec::new(1, 5).unwrap()),
            (
                Some(FilterSpec::new("title", "a")),
                Some(SortSpec::new("title", SortDirection::Desc)),
                PageSpec::new(1, 5).unwrap(),
            ),
        ];

        for (filter, sort, page) in cases {
            let query =
                parse_for::<Category>(filter.as_ref(), sort.as_ref(), page, None).unwrap();

            let from_sql = fetch_page::<Category>(db.pool(), &query).await.unwrap();
            let in_memory = paginate(all.clone(), &query);

            assert_eq!(from_sql, in_memory, "query {query:?}");
        }
    }

    #[tokio::test]
    async fn test_product_sql_matches_in_memory() {
        let fx = testing::fixture().await;

        // (title, label, price_cents); release dates advance one day per product
        let jazz = [
            ("Blue Train", "Blue Note", 2499),
            ("Kind of Blue", "Columbia", 1999),
            ("Speak No Evil", "blue note", 2999),
            ("A Love Supreme", "Impulse!", 1999),
            ("Moanin'", "BLUE NOTE", 999),
            ("Time Out", "Columbia", 4999),
            ("Blue Note Sampler", "Blue Note Records", 500),
        ];
        for (title, label, price) in jazz {
            let mut draft = fx.draft(title, label);
            draft.price_cents = price;
            fx.db
                .products()
                .create_with_image(draft, testing::image_data(title))
                .await
                .unwrap();
        }

        let rock = fx.db.categories().create("Rock").await.unwrap();
        for (title, price) in [("Blue Lines", 1999), ("Abbey Road", 2999)] {
            let mut draft = fx.draft(title, "Blue Note");
            draft.category_id = rock.id.clone();
            draft.price_cents = price;
            fx.db
                .products()
                .create_with_image(draft, testing::image_data(title))
                .await
                .unwrap();
        }

        let all = fx.db.store::<Product>().list_all().await.unwrap();
        let jazz_id = fx.category.id.as_str();
        let page = |n| PageSpec::new(n, 5).unwrap();

        let cases = [
            (Some(FilterSpec::new("label", "Blue Note")), None, page(1), None),
            (
                Some(FilterSpec::new("label", "blue note")),
                Some(SortSpec::new("price", SortDirection::Desc)),
                page(1),
                Some(jazz_id),
            ),
            (
                Some(FilterSpec::new("release_date", "2000-01-02..2000-01-05")),
                Some(SortSpec::new("release_date", SortDirection::Desc)),
                page(1),
                None,
            ),
            (
                Some(FilterSpec::new("release_date", "2000-01-04")),
                None,
                page(1),
                None,
            ),
            (None, Some(SortSpec::new("price", SortDirection::Desc)), page(1), None),
            (None, Some(SortSpec::new("price", SortDirection::Desc)), page(2), None),
            (None, Some(SortSpec::new("price", SortDirection::Asc)), page(2), Some(jazz_id)),
            (Some(FilterSpec::new("title", "BLUE")), None, page(1), Some(rock.id.as_str())),
            (
                Some(FilterSpec::new("description_short", "lp")),
                Some(SortSpec::new("label", SortDirection::Asc)),
                page(2),
                None,
            ),
        ];

        for (filter, sort, page, category_id) in cases {
            let query =
                parse_for::<Product>(filter.as_ref(), sort.as_ref(), page, category_id).unwrap();

            let from_sql = fetch_page::<Product>(fx.db.pool(), &query).await.unwrap();
            let in_memory = paginate(all.clone(), &query);

            assert_eq!(from_sql, in_memory, "query {query:?}");
        }
    }

    #[tokio::test]
    async fn test_filter_and_count() {
        let (db, _) = seeded().await;

        let filter = FilterSpec::new("title", "jazz");
        let query = parse_for::<Category>(Some(&filter), None, PageSpec::new(1, 5).unwrap(), None)
            .unwrap();
        let page = fetch_page::<Category>(db.pool(), &query).await.unwrap();

        assert_eq!(page.total_items, 4);
        assert_eq!(page.page_count, 1);
        for item in &page.items {
            assert!(item.title.to_ascii_lowercase().contains("jazz"));
        }
    }

    #[tokio::test]
    async fn test_category_prefilter_rejected_for_categories() {
        let (db, _) = seeded().await;

        let query = PagedQuery {
            category_id: Some("c1".to_string()),
            filter: None,
            sort: CategoryField::Title,
            direction: SortDirection::Asc,
            page: PageSpec::default(),
        };

        let err = fetch_page::<Category>(db.pool(), &query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
