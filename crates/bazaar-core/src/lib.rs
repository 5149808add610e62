//! # bazaar-core: Pure Domain Logic for Bazaar
//!
//! This crate holds the entity types, error kinds, validation rules and the
//! storage-independent paged query engine. It performs no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              API layer (external, not in this workspace)        │   │
//! │  │    routing, auth decisions, DTO mapping, status codes           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ErrorKind + domain types               │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   query   │  │   money   │  │ validation│  │   │
//! │  │   │ Category  │  │ PageSpec  │  │   Money   │  │   rules   │  │   │
//! │  │   │ Product   │  │ Fields    │  │           │  │   checks  │  │   │
//! │  │   │ Wishlist  │  │ paginate  │  │           │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Database Layer)                   │   │
//! │  │     EntityStore, SQL paged queries, wishlist, cascades          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Category, Product, Image, User, WishlistItem)
//! - [`query`] - Filter/sort/page specs, field allow-lists, in-memory paging
//! - [`money`] - Integer-cent prices
//! - [`error`] - Error kinds and domain errors
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::query::{parse_for, FilterSpec, PageSpec};
//! use bazaar_core::Product;
//!
//! // Unknown fields never reach storage.
//! let filter = FilterSpec::new("password_hash", "x");
//! assert!(parse_for::<Product>(Some(&filter), None, PageSpec::default(), None).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod query;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ErrorKind, ValidationError};
pub use money::Money;
pub use query::{FilterSpec, Page, PageSpec, SortDirection, SortSpec};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Smallest page size a listing accepts.
pub const MIN_ITEMS_PER_PAGE: u32 = 5;

/// Largest page size a listing accepts.
pub const MAX_ITEMS_PER_PAGE: u32 = 50;

/// Page size used when the caller does not pick one.
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 10;
