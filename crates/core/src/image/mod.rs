//! Image catalog and storage manager.
//!
//! The catalog is the single source of truth for whether a blob still
//! exists: blobs are only created and deleted through it. This module
//! provides:
//! - Domain types for catalog rows and reference rows
//! - Repository traits implemented by the db crate
//! - [`ImageService`] - upload, serve, and delete orchestration

mod error;
mod repository;
mod service;
mod types;

pub use error::ImageError;
pub use repository::{CreateReferenceInput, ImageReferenceRepository, ImageRepository};
pub use service::{ImageService, UploadLimits, serving_url};
pub use types::{
    CreateImageInput, Image, ImageKind, ImageReference, ImageStatus, ReferenceUsage, UploadInput,
    UploadResult,
};
