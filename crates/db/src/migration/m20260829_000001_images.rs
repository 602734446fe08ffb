//! Initial migration: image catalog and reference tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(IMAGES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS image_references CASCADE; DROP TABLE IF EXISTS images CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const IMAGES_SQL: &str = r"
-- Image catalog: one row per uploaded asset
CREATE TABLE images (
    id UUID PRIMARY KEY,
    storage_key TEXT NOT NULL,
    storage_provider VARCHAR(64) NOT NULL,
    owner_id UUID NOT NULL,
    kind VARCHAR(16) NOT NULL CHECK (kind IN ('avatar', 'title', 'content', 'general')),
    content_type VARCHAR(255) NOT NULL,
    file_size BIGINT NOT NULL CHECK (file_size >= 0),
    width INTEGER,
    height INTEGER,
    alt TEXT,
    status VARCHAR(16) NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'orphaned', 'deleted')),
    orphaned_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_images_provider_key UNIQUE (storage_provider, storage_key),
    CONSTRAINT chk_images_orphaned_at CHECK (status <> 'orphaned' OR orphaned_at IS NOT NULL)
);

-- Index for a user's image listing
CREATE INDEX idx_images_owner ON images(owner_id) WHERE status <> 'deleted';

-- Index for the orphan sweep (overdue orphans, oldest first)
CREATE INDEX idx_images_orphaned ON images(orphaned_at) WHERE status = 'orphaned';

-- Index for the unreferenced-active sweep
CREATE INDEX idx_images_active_created ON images(created_at) WHERE status = 'active';

-- References from content-bearing entities to images
CREATE TABLE image_references (
    id UUID PRIMARY KEY,
    image_id UUID NOT NULL REFERENCES images(id) ON DELETE CASCADE,
    owner_entity_id UUID NOT NULL,
    usage VARCHAR(16) NOT NULL CHECK (usage IN ('title', 'content')),
    position INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_image_refs_tuple UNIQUE (image_id, owner_entity_id, usage)
);

-- Index for reference counting per image
CREATE INDEX idx_image_refs_image ON image_references(image_id);

-- Index for entity update/delete cleanup
CREATE INDEX idx_image_refs_entity ON image_references(owner_entity_id);
";
