//! Image catalog repository for database operations.
//!
//! Implements the image catalog persistence trait using `SeaORM`.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{image_references, images};
use fable_core::image::{
    CreateImageInput, Image, ImageError, ImageRepository as ImageRepoTrait, ImageKind, ImageStatus,
};

/// Image catalog repository implementation.
#[derive(Debug, Clone)]
pub struct ImageRepository {
    db: DatabaseConnection,
}

impl ImageRepository {
    /// Create a new image repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl ImageRepoTrait for ImageRepository {
    async fn create(&self, input: CreateImageInput) -> Result<Image, ImageError> {
        let now = Utc::now();
        let active_model = images::ActiveModel {
            id: Set(input.id),
            storage_key: Set(input.storage_key),
            storage_provider: Set(input.storage_provider),
            owner_id: Set(input.owner_id),
            kind: Set(input.kind.as_str().to_string()),
            content_type: Set(input.content_type),
            file_size: Set(input.file_size),
            width: Set(input.width),
            height: Set(input.height),
            alt: Set(input.alt),
            status: Set(ImageStatus::Active.as_str().to_string()),
            orphaned_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        to_domain(model)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Image>, ImageError> {
        let model = images::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        model.map(to_domain).transpose()
    }

    async fn find_by_storage_key(
        &self,
        provider: &str,
        key: &str,
    ) -> Result<Option<Image>, ImageError> {
        let model = images::Entity::find()
            .filter(images::Column::StorageProvider.eq(provider))
            .filter(images::Column::StorageKey.eq(key))
            .one(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        model.map(to_domain).transpose()
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Image>, ImageError> {
        let models = images::Entity::find()
            .filter(images::Column::OwnerId.eq(owner_id))
            .filter(images::Column::Status.ne(ImageStatus::Deleted.as_str()))
            .order_by_desc(images::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        models.into_iter().map(to_domain).collect()
    }

    async fn set_status(&self, id: Uuid, status: ImageStatus) -> Result<(), ImageError> {
        let Some(model) = images::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?
        else {
            return Ok(());
        };
        let current = parse_status(&model.status)?;
        if !current.can_transition(status) {
            return Ok(());
        }

        let orphaned_at = match status {
            ImageStatus::Orphaned => Set(Some(Utc::now().into())),
            ImageStatus::Active => Set(None),
            ImageStatus::Deleted => sea_orm::ActiveValue::NotSet,
        };
        let mut active_model: images::ActiveModel = model.into();
        active_model.status = Set(status.as_str().to_string());
        active_model.orphaned_at = orphaned_at;
        active_model.updated_at = Set(Utc::now().into());
        active_model
            .update(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ImageError> {
        let result = images::Entity::delete_many()
            .filter(images::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    async fn list_overdue_orphans(&self, cutoff: DateTime<Utc>) -> Result<Vec<Image>, ImageError> {
        let models = images::Entity::find()
            .filter(images::Column::Status.eq(ImageStatus::Orphaned.as_str()))
            .filter(images::Column::OrphanedAt.lte(cutoff))
            .order_by_asc(images::Column::OrphanedAt)
            .all(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        models.into_iter().map(to_domain).collect()
    }

    async fn list_unreferenced_active(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Image>, ImageError> {
        let referenced = Query::select()
            .column(image_references::Column::ImageId)
            .from(image_references::Entity)
            .to_owned();
        let models = images::Entity::find()
            .filter(images::Column::Status.eq(ImageStatus::Active.as_str()))
            .filter(images::Column::CreatedAt.lte(cutoff))
            .filter(images::Column::Id.not_in_subquery(referenced))
            .order_by_asc(images::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| ImageError::repository(e.to_string()))?;

        models.into_iter().map(to_domain).collect()
    }
}

/// Parse a stored status string, treating unknown values as corruption.
fn parse_status(s: &str) -> Result<ImageStatus, ImageError> {
    ImageStatus::parse(s)
        .ok_or_else(|| ImageError::repository(format!("unknown image status '{s}'")))
}

/// Parse a stored kind string, treating unknown values as corruption.
fn parse_kind(s: &str) -> Result<ImageKind, ImageError> {
    ImageKind::parse(s).ok_or_else(|| ImageError::repository(format!("unknown image kind '{s}'")))
}

/// Convert database model to domain model.
fn to_domain(model: images::Model) -> Result<Image, ImageError> {
    Ok(Image {
        id: model.id,
        storage_key: model.storage_key,
        storage_provider: model.storage_provider,
        owner_id: model.owner_id,
        kind: parse_kind(&model.kind)?,
        content_type: model.content_type,
        file_size: model.file_size,
        width: model.width,
        height: model.height,
        alt: model.alt,
        status: parse_status(&model.status)?,
        orphaned_at: model.orphaned_at.map(|at| at.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
