//! # Domain Types
//!
//! Core domain types used throughout Bazaar.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Category     │   │    Product      │   │     Image       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  category_id    │   │  id             │       │
//! │  │  title (uniq)   │   │  image_id       │──►│  description    │       │
//! │  └─────────────────┘   │  user_id        │   │  base64_string  │       │
//! │                        │  price_cents    │   │  image_type     │       │
//! │  ┌─────────────────┐   └────────▲────────┘   └─────────────────┘       │
//! │  │      User       │            │                                       │
//! │  │  ─────────────  │   ┌────────┴────────┐                              │
//! │  │  id             │◄──│  WishlistItem   │                              │
//! │  │  email (uniq)   │   │  (user_id,      │                              │
//! │  │  is_admin       │   │   product_id)   │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity except [`WishlistItem`] carries an opaque string id (UUID v4
//! text). An empty id means "not yet assigned"; the store fills it in on add.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Identity Capability
// =============================================================================

/// Minimal capability every stored entity exposes: an id.
pub trait HasId {
    /// Returns the entity id (empty when not yet assigned).
    fn id(&self) -> &str;

    /// Replaces the entity id.
    fn set_id(&mut self, id: String);

    /// Whether an id has been assigned.
    fn has_id(&self) -> bool {
        !self.id().is_empty()
    }
}

/// An entity with a human-readable kind name, used in errors and logs.
pub trait Entity: HasId {
    const NAME: &'static str;
}

/// Generates a new entity id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

macro_rules! impl_entity {
    ($ty:ty, $name:literal) => {
        impl HasId for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }

        impl Entity for $ty {
            const NAME: &'static str = $name;
        }
    };
}

// =============================================================================
// Category
// =============================================================================

/// A product category. Titles are unique case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub title: String,
}

impl Category {
    /// Creates a category without an id.
    pub fn new(title: impl Into<String>) -> Self {
        Category {
            id: String::new(),
            title: title.into(),
        }
    }
}

impl_entity!(Category, "Category");

/// A category together with the number of products filed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategorySummary {
    pub category: Category,
    pub product_count: i64,
}

// =============================================================================
// Image
// =============================================================================

/// Supported image encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Png,
    Jpg,
    Jpeg,
}

impl ImageType {
    pub const ALL: [ImageType; 3] = [ImageType::Png, ImageType::Jpg, ImageType::Jpeg];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Png => "png",
            ImageType::Jpg => "jpg",
            ImageType::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "image_type".to_string(),
                allowed: ImageType::ALL.iter().map(|t| t.to_string()).collect(),
            })
    }
}

/// Image content without identity, as supplied by the API layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ImageData {
    pub description: String,
    pub base64_string: String,
    pub image_type: ImageType,
}

/// A stored product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Image {
    pub id: String,
    pub description: String,
    pub base64_string: String,
    pub image_type: ImageType,
}

impl Image {
    /// Creates an image row (without id) from its content.
    pub fn from_data(data: ImageData) -> Self {
        Image {
            id: String::new(),
            description: data.description,
            base64_string: data.base64_string,
            image_type: data.image_type,
        }
    }

    /// Whether the stored content equals `data` (description, payload and type).
    pub fn same_content(&self, data: &ImageData) -> bool {
        self.description == data.description
            && self.base64_string == data.base64_string
            && self.image_type == data.image_type
    }
}

impl_entity!(Image, "Image");

// =============================================================================
// User
// =============================================================================

/// A shop user (buyer and/or seller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Opaque hash produced by the (external) password service.
    #[serde(skip)]
    pub password_hash: String,
    pub is_admin: bool,
}

impl_entity!(User, "User");

// =============================================================================
// Product
// =============================================================================

/// A product offered by a seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub category_id: String,
    /// Seller.
    pub user_id: String,
    pub image_id: String,
    pub title: String,
    pub description: String,
    pub description_short: String,
    pub label: String,
    #[ts(as = "String")]
    pub release_date: NaiveDate,
    /// Price in cents, never negative.
    pub price_cents: i64,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

impl_entity!(Product, "Product");

/// A product joined with its image, category title and seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductDetails {
    pub product: Product,
    pub image: Image,
    pub category_title: String,
    pub seller_first_name: String,
    pub seller_last_name: String,
    pub seller_email: String,
}

// =============================================================================
// Wishlist
// =============================================================================

/// A (user, product) wishlist association. The pair is the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WishlistItem {
    pub user_id: String,
    pub product_id: String,
}

impl WishlistItem {
    pub fn new(user_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        WishlistItem {
            user_id: user_id.into(),
            product_id: product_id.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_type_parsing() {
        assert_eq!("png".parse::<ImageType>().unwrap(), ImageType::Png);
        assert_eq!("JPEG".parse::<ImageType>().unwrap(), ImageType::Jpeg);
        assert!("gif".parse::<ImageType>().is_err());
    }

    #[test]
    fn test_has_id() {
        let mut category = Category::new("Books");
        assert!(!category.has_id());

        category.set_id(generate_id());
        assert!(category.has_id());
        assert_eq!(Category::NAME, "Category");
    }

    #[test]
    fn test_same_content() {
        let data = ImageData {
            description: "cover".to_string(),
            base64_string: "aGVsbG8=".to_string(),
            image_type: ImageType::Png,
        };
        let mut image = Image::from_data(data.clone());
        assert!(image.same_content(&data));

        image.image_type = ImageType::Jpg;
        assert!(!image.same_content(&data));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: "u1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "secret".to_string(),
            is_admin: false,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
    }
}
