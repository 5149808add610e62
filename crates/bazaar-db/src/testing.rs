//! Shared fixtures for the in-crate tests.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Duration, NaiveDate};

use bazaar_core::{Category, ImageData, ImageType, Product, User};

use crate::{Database, DbConfig};

pub(crate) async fn db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub(crate) fn user(first: &str, last: &str, email: &str) -> User {
    User {
        id: String::new(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$opaque".to_string(),
        is_admin: false,
    }
}

pub(crate) fn image_data(tag: &str) -> ImageData {
    ImageData {
        description: format!("{tag} cover"),
        base64_string: "aGVsbG8=".to_string(),
        image_type: ImageType::Jpg,
    }
}

/// A database with one category ("Jazz") and one seller.
pub(crate) struct Fixture {
    pub db: Database,
    pub category: Category,
    pub seller: User,
    drafts: AtomicI64,
}

pub(crate) async fn fixture() -> Fixture {
    let db = db().await;
    let category = db.categories().create("Jazz").await.unwrap();
    let seller = db
        .users()
        .create(user("Rudy", "Van Gelder", "rudy@example.com"))
        .await
        .unwrap();

    Fixture {
        db,
        category,
        seller,
        drafts: AtomicI64::new(0),
    }
}

impl Fixture {
    /// A product in the fixture category, sold by the fixture seller.
    /// Release dates start at 2000-01-01 and advance one day per draft.
    pub fn draft(&self, title: &str, label: &str) -> Product {
        let n = self.drafts.fetch_add(1, Ordering::SeqCst);
        let base = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();

        Product {
            id: String::new(),
            category_id: self.category.id.clone(),
            user_id: self.seller.id.clone(),
            image_id: String::new(),
            title: title.to_string(),
            description: format!("{title} (remastered)"),
            description_short: "LP".to_string(),
            label: label.to_string(),
            release_date: base + Duration::days(n),
            price_cents: 1999 + n * 100,
        }
    }

    pub async fn product(&self, title: &str, label: &str) -> Product {
        self.db
            .products()
            .create_with_image(self.draft(title, label), image_data(title))
            .await
            .unwrap()
    }

    pub async fn buyer(&self, email: &str) -> User {
        self.db
            .users()
            .create(user("Buyer", "Person", email))
            .await
            .unwrap()
    }
}
