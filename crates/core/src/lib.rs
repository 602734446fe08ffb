//! Core business logic for the Fable image subsystem.
//!
//! This crate implements the image storage and reference-counted
//! garbage-collection engine:
//! - [`storage`] - object store providers and the provider registry
//! - [`image`] - image catalog types, repository traits, and the storage manager
//! - [`content`] - rewriting between display and canonical content forms
//! - [`tracker`] - reference bookkeeping between entities and images
//! - [`gc`] - orphan detection and delayed reclaim
//! - [`legacy`] - backfill of pre-catalog direct-URL assets

pub mod content;
pub mod gc;
pub mod image;
pub mod legacy;
pub mod storage;
pub mod tracker;

#[cfg(test)]
pub(crate) mod testutil;
