//! `SeaORM` entity definitions.

pub mod image_references;
pub mod images;
