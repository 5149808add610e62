//! # Image Repository
//!
//! Product images. An image row lives exactly as long as the product that
//! points at it; replacement and removal go through the cascade
//! orchestrator so a product never references a deleted image.

use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use bazaar_core::validation::validate_image_data;
use bazaar_core::{Image, ImageData};

use crate::error::DbResult;
use crate::store::{EntityStore, Table, UnitOfWork};

impl Table for Image {
    const TABLE: &'static str = "images";
    const COLUMNS: &'static [&'static str] = &["description", "base64_string", "image_type"];

    fn bind_columns<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        query
            .bind(&self.description)
            .bind(&self.base64_string)
            .bind(self.image_type)
    }
}

/// Repository for image rows.
#[derive(Debug, Clone)]
pub struct ImageRepository {
    store: EntityStore<Image>,
}

impl ImageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ImageRepository {
            store: EntityStore::new(pool),
        }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Image>> {
        self.store.get_by_id(id).await
    }

    pub async fn exists(&self, id: &str) -> DbResult<bool> {
        self.store.exists(id).await
    }

    /// Stores new image content, returning the row with its id.
    pub async fn create(&self, data: ImageData) -> DbResult<Image> {
        validate_image_data(&data)?;
        self.store.add(Image::from_data(data)).await
    }

    /// Stores new image content inside an existing unit of work.
    ///
    /// Callers validate `data` before opening the unit.
    pub(crate) async fn create_in(&self, uow: &mut UnitOfWork, data: ImageData) -> DbResult<Image> {
        debug!(image_type = %data.image_type, "Storing image");
        self.store.add_in(uow, Image::from_data(data)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bazaar_core::{ErrorKind, ImageType};

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let images = db.images();

        let image = images
            .create(ImageData {
                description: "cover".to_string(),
                base64_string: "aGVsbG8=".to_string(),
                image_type: ImageType::Jpeg,
            })
            .await
            .unwrap();

        let loaded = images.get_by_id(&image.id).await.unwrap().unwrap();
        assert_eq!(loaded.image_type, ImageType::Jpeg);
        assert_eq!(loaded.base64_string, "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_rejects_bad_payload() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db
            .images()
            .create(ImageData {
                description: "cover".to_string(),
                base64_string: "%%%".to_string(),
                image_type: ImageType::Png,
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
