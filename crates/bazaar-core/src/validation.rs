//! # Validation Module
//!
//! Input validation for entities before they reach the database.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: API layer (external)                                         │
//! │  └── Deserialization, request shape                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required fields, lengths, price sign                              │
//! │  └── Image payload is base64, image type is allowed                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE ... COLLATE NOCASE (category title, user email)            │
//! │  └── FOREIGN KEY (category, image, seller, wishlist references)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here runs before a transaction is opened, so a rejected input
//! never has side effects.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ValidationError;
use crate::types::{ImageData, Product, User};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_TITLE_LEN: usize = 200;
const MAX_LABEL_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;

// =============================================================================
// String Validators
// =============================================================================

fn require(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a category or product title.
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_title;
///
/// assert!(validate_title("Vinyl").is_ok());
/// assert!(validate_title("  ").is_err());
/// ```
pub fn validate_title(title: &str) -> ValidationResult<()> {
    require("title", title, MAX_TITLE_LEN)
}

/// Validates an email address (shape only, uniqueness is a storage concern).
pub fn validate_email(email: &str) -> ValidationResult<()> {
    require("email", email, MAX_EMAIL_LEN)?;

    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::invalid_format(
            "email",
            "must look like name@domain.tld",
        )),
    }
}

/// Validates an entity id reference.
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id)
        .map_err(|_| ValidationError::invalid_format("id", "must be a valid UUID"))?;

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Entity Validators
// =============================================================================

/// Validates image content: description present, payload is base64.
pub fn validate_image_data(image: &ImageData) -> ValidationResult<()> {
    require("description", &image.description, MAX_TITLE_LEN)?;

    if image.base64_string.trim().is_empty() {
        return Err(ValidationError::required("base64_string"));
    }

    STANDARD
        .decode(image.base64_string.trim())
        .map_err(|e| ValidationError::invalid_format("base64_string", e.to_string()))?;

    Ok(())
}

pub fn validate_user(user: &User) -> ValidationResult<()> {
    require("first_name", &user.first_name, MAX_TITLE_LEN)?;
    require("last_name", &user.last_name, MAX_TITLE_LEN)?;
    validate_email(&user.email)?;

    if user.password_hash.is_empty() {
        return Err(ValidationError::required("password_hash"));
    }

    Ok(())
}

/// Validates a product before its image exists: everything except `image_id`.
pub fn validate_new_product(product: &Product) -> ValidationResult<()> {
    validate_title(&product.title)?;
    require("label", &product.label, MAX_LABEL_LEN)?;
    validate_price_cents(product.price_cents)?;

    for (field, value) in [
        ("category_id", &product.category_id),
        ("user_id", &product.user_id),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::required(field));
        }
    }

    Ok(())
}

/// Validates a product's own fields. Reference targets (category, image,
/// seller) are checked by the database's foreign keys.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_new_product(product)?;

    if product.image_id.trim().is_empty() {
        return Err(ValidationError::required("image_id"));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
