//! # Seed Data Generator
//!
//! Populates the database with a record-shop catalog for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p bazaar-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p bazaar-db --bin seed -- --count 1000
//!
//! # Specify database path (otherwise bazaar.toml / BAZAAR_DB_PATH)
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db
//! ```
//!
//! ## Generated Data
//! - One seller account and one admin account
//! - One category per genre below
//! - Products cycling through the genre's titles and labels, each with
//!   its own cover image, spread over release dates from 1955 onwards
//!
//! Finishes by printing the per-category product counts as JSON.

use chrono::{Duration, NaiveDate};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bazaar_core::{Category, ImageData, ImageType, Product, User};
use bazaar_db::{BazaarConfig, Database};

/// Genres with a handful of titles and record labels each.
const GENRES: &[(&str, &[&str], &[&str])] = &[
    (
        "Jazz",
        &[
            "Blue Train",
            "Kind of Blue",
            "A Love Supreme",
            "Mingus Ah Um",
            "Moanin'",
            "Time Out",
            "Saxophone Colossus",
            "Speak No Evil",
        ],
        &["Blue Note", "Columbia", "Impulse!", "Prestige"],
    ),
    (
        "Soul",
        &[
            "What's Going On",
            "Songs in the Key of Life",
            "Lady Soul",
            "Otis Blue",
            "Hot Buttered Soul",
            "Superfly",
        ],
        &["Motown", "Atlantic", "Stax", "Curtom"],
    ),
    (
        "Electronic",
        &[
            "Selected Ambient Works",
            "Music Has the Right to Children",
            "Homework",
            "Dummy",
            "Mezzanine",
            "Endtroducing",
        ],
        &["Warp", "Virgin", "Go! Beat", "Mo' Wax"],
    ),
    (
        "Classical",
        &[
            "Goldberg Variations",
            "The Four Seasons",
            "Symphony No. 9",
            "Clair de Lune",
            "The Rite of Spring",
        ],
        &["Deutsche Grammophon", "Decca", "Naxos"],
    ),
];

/// 1x1 transparent PNG.
const COVER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bazaar_db=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bazaar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("      --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = BazaarConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    info!(path = %config.database.path.display(), count, "Seeding database");

    let db = Database::new(config.db_config()).await?;

    let existing = db.store::<Product>().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();

    let seller = db.users().create(account("Rudy", "Van Gelder", "seller@bazaar.test", false)).await?;
    db.users().create(account("Ada", "Admin", "admin@bazaar.test", true)).await?;

    let mut categories = Vec::with_capacity(GENRES.len());
    for (genre, _, _) in GENRES {
        categories.push(db.categories().create(genre).await?);
    }

    let mut generated = 0;
    while generated < count {
        let genre_idx = generated % GENRES.len();
        let product = generate_product(&categories[genre_idx], &seller, generated);
        let cover = cover_for(&product.title);

        match db.products().create_with_image(product, cover).await {
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Failed to insert product");
                break;
            }
        }

        generated += 1;
        if generated % 50 == 0 {
            info!(generated, "Progress");
        }
    }

    let elapsed = start.elapsed();
    info!(
        generated,
        elapsed_ms = elapsed.as_millis() as u64,
        rate = generated as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        "Seed complete"
    );

    let summary = db.categories().list_with_product_counts().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    db.close().await;
    Ok(())
}

fn account(first: &str, last: &str, email: &str, is_admin: bool) -> User {
    User {
        id: String::new(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$v=19$seed".to_string(),
        is_admin,
    }
}

/// Generates the `seed`th product in `category`.
///
/// Titles repeat once the genre's list is exhausted, so a pressing number
/// is appended to keep them distinguishable.
fn generate_product(category: &Category, seller: &User, seed: usize) -> Product {
    let (_, titles, labels) = GENRES
        .iter()
        .find(|(genre, _, _)| *genre == category.title)
        .copied()
        .unwrap_or(GENRES[0]);

    let round = seed / GENRES.len();
    let title = titles[round % titles.len()];
    let pressing = round / titles.len();
    let title = if pressing == 0 {
        title.to_string()
    } else {
        format!("{title} (pressing {})", pressing + 1)
    };

    let epoch = NaiveDate::from_ymd_opt(1955, 1, 1).unwrap_or_default();

    Product {
        id: String::new(),
        category_id: category.id.clone(),
        user_id: seller.id.clone(),
        image_id: String::new(),
        description: format!("{title}, {} LP", category.title),
        description_short: "Vinyl LP".to_string(),
        label: labels[seed % labels.len()].to_string(),
        release_date: epoch + Duration::days((seed as i64 * 97) % 25_000),
        price_cents: 999 + ((seed as i64 * 373) % 4_000),
        title,
    }
}

fn cover_for(title: &str) -> ImageData {
    ImageData {
        description: format!("{title} front cover"),
        base64_string: COVER_PNG.to_string(),
        image_type: ImageType::Png,
    }
}
