//! # Entity Store
//!
//! Generic transactional CRUD for any entity with an id.
//!
//! ## Transaction Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      One Call, One Transaction                          │
//! │                                                                         │
//! │  store.add(entity)                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UnitOfWork::begin(pool)  ──►  store.add_in(&mut uow, entity)          │
//! │                                       │                                 │
//! │                              Ok ──────┴────── Err                       │
//! │                              │                 │                        │
//! │                              ▼                 ▼                        │
//! │                        uow.commit()      uow dropped → ROLLBACK        │
//! │                                                                         │
//! │  Larger operations (cascades) open ONE UnitOfWork and call the         │
//! │  *_in variants of several stores with it.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Binding Entities to Tables
//! There is no reflection: each entity type implements [`Table`], naming its
//! table, its non-id columns and how to bind them in that order.

use std::marker::PhantomData;

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};

use bazaar_core::{generate_id, Entity};

use crate::error::{DbError, DbResult};

// =============================================================================
// Unit of Work
// =============================================================================

/// A single open transaction threaded through one logical operation.
///
/// The transaction starts with `BEGIN IMMEDIATE`: the write lock is taken
/// up front, so a unit that reads before it writes waits behind other
/// writers (busy timeout) instead of failing with `database is locked`.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] rolls
/// back every write made through it.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    /// Opens a write transaction on the pool.
    pub async fn begin(pool: &SqlitePool) -> DbResult<Self> {
        let tx = pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(UnitOfWork { tx })
    }

    /// The connection every statement of this unit runs on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// =============================================================================
// Table Binding
// =============================================================================

/// Binding between an entity type and its table.
pub trait Table: Entity + for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    /// Table name.
    const TABLE: &'static str;

    /// Columns other than `id`, in the order [`Table::bind_columns`] binds them.
    const COLUMNS: &'static [&'static str];

    /// Column holding the owning category, for entities filed under one.
    const CATEGORY_COLUMN: Option<&'static str> = None;

    /// Binds the values of [`Table::COLUMNS`], in order.
    fn bind_columns<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>>;

    /// `id, col1, col2, ...`
    fn select_list() -> String {
        std::iter::once("id")
            .chain(Self::COLUMNS.iter().copied())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// =============================================================================
// Entity Store
// =============================================================================

/// Generic CRUD store for one entity type.
///
/// ## Usage
/// ```rust,ignore
/// let store = db.store::<Category>();
///
/// let jazz = store.add(Category::new("Jazz")).await?;
/// assert!(store.get_by_id(&jazz.id).await?.is_some());
///
/// store.delete(&jazz.id).await?;
/// ```
#[derive(Debug)]
pub struct EntityStore<T> {
    pool: SqlitePool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityStore<T> {
    fn clone(&self) -> Self {
        EntityStore {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Table> EntityStore<T> {
    pub fn new(pool: SqlitePool) -> Self {
        EntityStore {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Standalone Operations (one transaction each)
    // =========================================================================

    /// Inserts `entity`, assigning an id if it has none.
    ///
    /// ## Errors
    /// * `UniqueViolation` - the id (or another unique key) is taken
    /// * `ForeignKeyViolation` - a referenced row does not exist
    pub async fn add(&self, entity: T) -> DbResult<T> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        let entity = self.add_in(&mut uow, entity).await?;
        uow.commit().await?;

        info!(entity = T::NAME, id = %entity.id(), "Entity added");
        Ok(entity)
    }

    /// Gets an entity by id. Absence is `Ok(None)`.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<T>> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", T::select_list(), T::TABLE);

        let entity = sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entity)
    }

    /// Replaces every column of the row with `entity`'s values.
    ///
    /// ## Errors
    /// * `NotFound` - no row has that id
    pub async fn update(&self, entity: &T) -> DbResult<()> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        self.update_in(&mut uow, entity).await?;
        uow.commit().await?;

        info!(entity = T::NAME, id = %entity.id(), "Entity updated");
        Ok(())
    }

    /// Deletes the row with `id`.
    ///
    /// ## Errors
    /// * `NotFound` - no row has that id
    /// * `ForeignKeyViolation` - another row still references it
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut uow = UnitOfWork::begin(&self.pool).await?;
        self.delete_in(&mut uow, id).await?;
        uow.commit().await?;

        info!(entity = T::NAME, id = %id, "Entity deleted");
        Ok(())
    }

    /// Deletes the row `entity` was loaded from.
    pub async fn delete_entity(&self, entity: &T) -> DbResult<()> {
        self.delete(entity.id()).await
    }

    pub async fn exists(&self, id: &str) -> DbResult<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)", T::TABLE);

        let exists: bool = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", T::TABLE);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Lists every row, ordered by id.
    pub async fn list_all(&self) -> DbResult<Vec<T>> {
        let sql = format!("SELECT {} FROM {} ORDER BY id", T::select_list(), T::TABLE);
        let rows = sqlx::query_as::<_, T>(&sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    // =========================================================================
    // Unit-of-Work Operations
    // =========================================================================

    pub async fn add_in(&self, uow: &mut UnitOfWork, mut entity: T) -> DbResult<T> {
        if !entity.has_id() {
            entity.set_id(generate_id());
        }

        debug!(entity = T::NAME, id = %entity.id(), "Inserting");

        let placeholders = vec!["?"; T::COLUMNS.len() + 1].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            T::TABLE,
            T::select_list(),
            placeholders
        );

        let query = sqlx::query(&sql).bind(entity.id());
        entity
            .bind_columns(query)
            .execute(uow.conn())
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { field, .. } if field == format!("{}.id", T::TABLE) => {
                    DbError::duplicate(format!("{} id", T::NAME), entity.id())
                }
                other => other,
            })?;

        Ok(entity)
    }

    pub async fn get_by_id_in(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<Option<T>> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", T::select_list(), T::TABLE);

        let entity = sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(uow.conn())
            .await?;

        Ok(entity)
    }

    /// Like [`EntityStore::get_by_id_in`] but absence is `NotFound`.
    pub async fn require_in(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<T> {
        self.get_by_id_in(uow, id)
            .await?
            .ok_or_else(|| DbError::not_found(T::NAME, id))
    }

    pub async fn update_in(&self, uow: &mut UnitOfWork, entity: &T) -> DbResult<()> {
        debug!(entity = T::NAME, id = %entity.id(), "Updating");

        let assignments = T::COLUMNS
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE id = ?", T::TABLE, assignments);

        let result = entity
            .bind_columns(sqlx::query(&sql))
            .bind(entity.id())
            .execute(uow.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(T::NAME, entity.id()));
        }

        Ok(())
    }

    pub async fn delete_in(&self, uow: &mut UnitOfWork, id: &str) -> DbResult<()> {
        debug!(entity = T::NAME, id = %id, "Deleting");

        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(uow.conn()).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(T::NAME, id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bazaar_core::{Category, ErrorKind, HasId};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_add_assigns_id() {
        let db = db().await;
        let store = db.store::<Category>();

        let jazz = store.add(Category::new("Jazz")).await.unwrap();
        assert!(jazz.has_id());

        let loaded = store.get_by_id(&jazz.id).await.unwrap().unwrap();
        assert_eq!(loaded, jazz);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_id_collision_is_conflict() {
        let db = db().await;
        let store = db.store::<Category>();

        let jazz = store.add(Category::new("Jazz")).await.unwrap();
        let mut clash = Category::new("Blues");
        clash.id = jazz.id.clone();

        let err = store.add(clash).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.list_all().await.unwrap(), vec![jazz]);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let db = db().await;
        let store = db.store::<Category>();

        assert!(store.get_by_id("missing").await.unwrap().is_none());
        assert!(!store.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_are_not_found() {
        let db = db().await;
        let store = db.store::<Category>();

        let mut ghost = Category::new("Ghost");
        ghost.id = generate_id();

        let err = store.update(&ghost).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = store.delete_entity(&ghost).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_persists() {
        let db = db().await;
        let store = db.store::<Category>();

        let mut soul = store.add(Category::new("Soul")).await.unwrap();
        soul.title = "Soul & Funk".to_string();
        store.update(&soul).await.unwrap();

        let loaded = store.get_by_id(&soul.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Soul & Funk");
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let db = db().await;
        let store = db.store::<Category>();

        {
            let mut uow = db.begin().await.unwrap();
            store.add_in(&mut uow, Category::new("Jazz")).await.unwrap();
            store.add_in(&mut uow, Category::new("Blues")).await.unwrap();
            // dropped without commit
        }

        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_writer_waits_for_open_unit_of_work() {
        let path = std::env::temp_dir().join(format!("bazaar-store-{}.db", generate_id()));
        let db = Database::new(DbConfig::new(&path).max_connections(2))
            .await
            .unwrap();
        let store = db.store::<Category>();

        // Read first, write later, with another writer committing in between.
        let mut uow = db.begin().await.unwrap();
        assert!(store.get_by_id_in(&mut uow, "missing").await.unwrap().is_none());

        let other = store.clone();
        let writer = tokio::spawn(async move { other.add(Category::new("Blues")).await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        store.add_in(&mut uow, Category::new("Soul")).await.unwrap();
        uow.commit().await.unwrap();

        writer.await.unwrap().unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
