//! Repository implementations backed by `SeaORM`.

mod image;
mod image_reference;

pub use image::ImageRepository;
pub use image_reference::ImageReferenceRepository;
