//! `SeaORM` Entity for the images table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub storage_key: String,
    pub storage_provider: String,
    pub owner_id: Uuid,
    pub kind: String,
    pub content_type: String,
    pub file_size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt: Option<String>,
    pub status: String,
    pub orphaned_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::image_references::Entity")]
    ImageReferences,
}

impl Related<super::image_references::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ImageReferences.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
