//! # bazaar-db: Persistence Layer for Bazaar
//!
//! Storage, paging and referential integrity for the Bazaar catalog.
//! SQLite through sqlx; every multi-step change runs in one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Data Flow                                 │
//! │                                                                         │
//! │  Service layer (delete category, list products, add to wishlist)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bazaar-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │   Database    │   │  Repositories  │   │  Cascade      │  │   │
//! │  │   │   (pool.rs)   │   │  EntityStore   │   │  Orchestrator │  │   │
//! │  │   │               │   │  WishlistIndex │   │               │  │   │
//! │  │   │ SqlitePool    │◄──│  fetch_page    │◄──│ UnitOfWork    │  │   │
//! │  │   │ Migrations    │   │                │   │ (one txn)     │  │   │
//! │  │   └───────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and repository access
//! - [`config`] - TOML/environment configuration
//! - [`store`] - Generic entity store and unit of work
//! - [`query`] - SQL rendering of paged filter/sort queries
//! - [`repository`] - Entity repositories and the wishlist index
//! - [`cascade`] - Multi-entity deletes and the image swap
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{BazaarConfig, Database};
//!
//! let config = BazaarConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let jazz = db.categories().create("Jazz").await?;
//! let report = db.cascade().delete_category(&jazz.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cascade;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;
pub mod store;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use cascade::{CascadeOrchestrator, CascadeReport};
pub use config::BazaarConfig;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use query::fetch_page;
pub use store::{EntityStore, Table, UnitOfWork};

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::image::ImageRepository;
pub use repository::product::ProductRepository;
pub use repository::user::UserRepository;
pub use repository::wishlist::WishlistIndex;
