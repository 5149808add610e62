//! # Repository Module
//!
//! Entity-specific repositories layered over [`crate::store::EntityStore`].
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  db.products().create_with_image(product, cover)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── validation (bazaar-core)                                          │
//! │  ├── joins / ordering / paging                                         │
//! │  └── EntityStore<Product>  ◄── generic add / get / update / delete     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`category::CategoryRepository`] - categories, title uniqueness, counts
//! - [`image::ImageRepository`] - image payloads
//! - [`product::ProductRepository`] - products, joined details, paging
//! - [`user::UserRepository`] - accounts and email lookup
//! - [`wishlist::WishlistIndex`] - user/product wishlist pairs
//!
//! Deletes that cross entities live in [`crate::cascade`].

pub mod category;
pub mod image;
pub mod product;
pub mod user;
pub mod wishlist;
