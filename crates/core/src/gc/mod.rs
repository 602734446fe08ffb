//! Orphan detection and garbage collection.
//!
//! Cleanup is event driven: entity update/delete events feed candidate
//! images through a mark-then-sweep pipeline. An image that loses its last
//! reference is marked `orphaned`; a delayed task re-checks the live
//! reference count after a grace window and only then deletes the blob.
//! The catalog row (`status = orphaned` + `orphaned_at`) doubles as the
//! durable pending-deletion queue: a periodic sweep re-scans for overdue
//! orphans, so scheduled deletions survive a process restart.

mod collector;

pub use collector::{GarbageCollector, SweepStats};
