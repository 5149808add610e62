//! # User Repository
//!
//! Database operations for users. Password hashes are opaque strings
//! produced by the caller; nothing here hashes or verifies them.
//!
//! Email lookups are case-insensitive (`COLLATE NOCASE` on the column).
//! Deleting a user is a cascade over their wishlist, see
//! [`crate::cascade::CascadeOrchestrator::delete_user`].

use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};
use tracing::{info, warn};

use bazaar_core::validation::validate_user;
use bazaar_core::User;

use crate::error::{DbError, DbResult};
use crate::store::{EntityStore, Table};

impl Table for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] =
        &["first_name", "last_name", "email", "password_hash", "is_admin"];

    fn bind_columns<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.first_name)
            .bind(&self.last_name)
            .bind(&self.email)
            .bind(&self.password_hash)
            .bind(self.is_admin)
    }
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    store: EntityStore<User>,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository {
            store: EntityStore::new(pool.clone()),
            pool,
        }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        self.store.get_by_id(id).await
    }

    /// Looks a user up by email, ignoring case.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", User::select_list());

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn email_exists(&self, email: &str) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
            .bind(email.trim())
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// Whether the user exists and carries the admin flag.
    pub async fn is_admin(&self, id: &str) -> DbResult<bool> {
        let admin: Option<bool> = sqlx::query_scalar("SELECT is_admin FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(admin.unwrap_or(false))
    }

    /// Lists every user ordered by last name.
    pub async fn list_all(&self) -> DbResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY last_name, first_name, id",
            User::select_list()
        );

        let users = sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?;
        Ok(users)
    }

    /// Creates a user.
    ///
    /// ## Errors
    /// * `Validation` - missing names, malformed email, empty hash
    /// * `UniqueViolation` - email already registered (case-insensitive)
    pub async fn create(&self, mut user: User) -> DbResult<User> {
        validate_user(&user)?;
        user.email = user.email.trim().to_string();

        if self.email_exists(&user.email).await? {
            warn!(email = %user.email, "Email already registered");
            return Err(DbError::duplicate("email", user.email));
        }

        let user = self.store.add(user).await?;
        info!(id = %user.id, "User created");
        Ok(user)
    }

    /// Persists every column of `user`.
    pub async fn update(&self, user: &User) -> DbResult<()> {
        validate_user(user)?;
        self.store.update(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use bazaar_core::ErrorKind;

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let db = testing::db().await;
        let users = db.users();

        let ada = users.create(testing::user("Ada", "Lovelace", "Ada@Example.com")).await.unwrap();

        let found = users.get_by_email("ada@example.COM").await.unwrap().unwrap();
        assert_eq!(found.id, ada.id);

        let err = users
            .create(testing::user("Other", "Ada", "ADA@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_list_all_ordered_by_last_name() {
        let db = testing::db().await;
        let users = db.users();

        users.create(testing::user("Grace", "Hopper", "grace@example.com")).await.unwrap();
        users.create(testing::user("Alan", "Turing", "alan@example.com")).await.unwrap();
        users.create(testing::user("Ada", "Lovelace", "ada@example.com")).await.unwrap();

        let names: Vec<_> = users
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.last_name)
            .collect();
        assert_eq!(names, vec!["Hopper", "Lovelace", "Turing"]);
    }

    #[tokio::test]
    async fn test_is_admin() {
        let db = testing::db().await;
        let users = db.users();

        let mut root = testing::user("Root", "Admin", "root@example.com");
        root.is_admin = true;
        let root = users.create(root).await.unwrap();
        let guest = users.create(testing::user("Guest", "User", "guest@example.com")).await.unwrap();

        assert!(users.is_admin(&root.id).await.unwrap());
        assert!(!users.is_admin(&guest.id).await.unwrap());
        assert!(!users.is_admin("missing").await.unwrap());
    }
}
