//! Image reference repository for database operations.
//!
//! Implements the reference table persistence trait using `SeaORM`. The
//! (image, entity, usage) uniqueness constraint is enforced by the database;
//! concurrent saves race through `ON CONFLICT DO NOTHING` rather than a
//! check-then-insert window.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::image_references;
use fable_core::image::{
    CreateReferenceInput, ImageError, ImageReferenceRepository as ReferenceRepoTrait,
    ReferenceUsage,
};

/// Image reference repository implementation.
#[derive(Debug, Clone)]
pub struct ImageReferenceRepository {
    db: DatabaseConnection,
}

impl ImageReferenceRepository {
    /// Create a new reference repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl ReferenceRepoTrait for ImageReferenceRepository {
    async fn create_if_absent(&self, input: CreateReferenceInput) -> Result<bool, ImageError> {
        let active_model = image_references::ActiveModel {
            id: Set(Uuid::new_v4()),
            image_id: Set(input.image_id),
            owner_entity_id: Set(input.owner_entity_id),
            usage: Set(input.usage.as_str().to_string()),
            position: Set(input.position),
            created_at: Set(Utc::now().into()),
        };

        let rows = image_references::Entity::insert(active_model)
            .on_conflict(
                OnConflict::columns([
                    image_references::Column::ImageId,
                    image_references::Column::OwnerEntityId,
                    image_references::Column::Usage,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        Ok(rows > 0)
    }

    async fn count_for_image(&self, image_id: Uuid) -> Result<u64, ImageError> {
        image_references::Entity::find()
            .filter(image_references::Column::ImageId.eq(image_id))
            .count(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))
    }

    async fn delete_one(
        &self,
        image_id: Uuid,
        owner_entity_id: Uuid,
        usage: ReferenceUsage,
    ) -> Result<bool, ImageError> {
        let result = image_references::Entity::delete_many()
            .filter(image_references::Column::ImageId.eq(image_id))
            .filter(image_references::Column::OwnerEntityId.eq(owner_entity_id))
            .filter(image_references::Column::Usage.eq(usage.as_str()))
            .exec(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn delete_for_entity(&self, owner_entity_id: Uuid) -> Result<Vec<Uuid>, ImageError> {
        let image_ids: Vec<Uuid> = image_references::Entity::find()
            .select_only()
            .column(image_references::Column::ImageId)
            .distinct()
            .filter(image_references::Column::OwnerEntityId.eq(owner_entity_id))
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        image_references::Entity::delete_many()
            .filter(image_references::Column::OwnerEntityId.eq(owner_entity_id))
            .exec(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        Ok(image_ids)
    }

    async fn delete_for_image(&self, image_id: Uuid) -> Result<u64, ImageError> {
        let result = image_references::Entity::delete_many()
            .filter(image_references::Column::ImageId.eq(image_id))
            .exec(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        Ok(result.rows_affected)
    }

    async fn image_ids_for_entity(&self, owner_entity_id: Uuid) -> Result<Vec<Uuid>, ImageError> {
        image_references::Entity::find()
            .select_only()
            .column(image_references::Column::ImageId)
            .distinct()
            .filter(image_references::Column::OwnerEntityId.eq(owner_entity_id))
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))
    }
}
