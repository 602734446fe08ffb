//! In-memory repositories and providers for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::image::{
    CreateImageInput, CreateReferenceInput, Image, ImageError, ImageReference,
    ImageReferenceRepository, ImageRepository, ImageStatus, ReferenceUsage,
};
use crate::storage::{
    ObjectMetadata, ObjectStore, OpendalStore, ProviderRegistry, StorageError, StoredObject,
};

/// Registry with a single in-memory provider named `mem`.
pub(crate) fn memory_registry() -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::new("mem");
    registry.register(Arc::new(
        OpendalStore::in_memory("mem").expect("memory store should build"),
    ));
    Arc::new(registry)
}

/// Image catalog backed by a `HashMap`.
pub(crate) struct MemoryImageRepository {
    images: Mutex<HashMap<Uuid, Image>>,
    refs: Arc<Mutex<Vec<ImageReference>>>,
    fail_create: AtomicBool,
    last_rejected: Mutex<Option<String>>,
}

impl MemoryImageRepository {
    pub(crate) fn new() -> Self {
        Self::with_refs(Arc::new(Mutex::new(Vec::new())))
    }

    fn with_refs(refs: Arc<Mutex<Vec<ImageReference>>>) -> Self {
        Self {
            images: Mutex::new(HashMap::new()),
            refs,
            fail_create: AtomicBool::new(false),
            last_rejected: Mutex::new(None),
        }
    }

    /// Make the next `create` call fail with a repository error.
    pub(crate) fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Storage key of the most recently rejected create, if any.
    pub(crate) fn last_rejected_key(&self) -> Option<String> {
        self.last_rejected.lock().unwrap().clone()
    }

    /// Backdate an image's creation time (grace-window tests).
    pub(crate) fn backdate(&self, id: Uuid, created_at: DateTime<Utc>) {
        if let Some(image) = self.images.lock().unwrap().get_mut(&id) {
            image.created_at = created_at;
        }
    }

    /// Backdate an image's orphaning time (sweep tests).
    pub(crate) fn backdate_orphaned(&self, id: Uuid, orphaned_at: DateTime<Utc>) {
        if let Some(image) = self.images.lock().unwrap().get_mut(&id) {
            image.orphaned_at = Some(orphaned_at);
        }
    }
}

impl ImageRepository for MemoryImageRepository {
    async fn create(&self, input: CreateImageInput) -> Result<Image, ImageError> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            *self.last_rejected.lock().unwrap() = Some(input.storage_key);
            return Err(ImageError::repository("simulated insert failure"));
        }

        let now = Utc::now();
        let image = Image {
            id: input.id,
            storage_key: input.storage_key,
            storage_provider: input.storage_provider,
            owner_id: input.owner_id,
            kind: input.kind,
            content_type: input.content_type,
            file_size: input.file_size,
            width: input.width,
            height: input.height,
            alt: input.alt,
            status: ImageStatus::Active,
            orphaned_at: None,
            created_at: now,
            updated_at: now,
        };
        self.images
            .lock()
            .unwrap()
            .insert(image.id, image.clone());
        Ok(image)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Image>, ImageError> {
        Ok(self.images.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_storage_key(
        &self,
        provider: &str,
        key: &str,
    ) -> Result<Option<Image>, ImageError> {
        Ok(self
            .images
            .lock()
            .unwrap()
            .values()
            .find(|i| i.storage_provider == provider && i.storage_key == key)
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Image>, ImageError> {
        Ok(self
            .images
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.owner_id == owner_id && i.status != ImageStatus::Deleted)
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: Uuid, status: ImageStatus) -> Result<(), ImageError> {
        let mut images = self.images.lock().unwrap();
        let Some(image) = images.get_mut(&id) else {
            return Ok(());
        };
        if !image.status.can_transition(status) {
            return Ok(());
        }
        image.status = status;
        image.orphaned_at = match status {
            ImageStatus::Orphaned => Some(Utc::now()),
            ImageStatus::Active => None,
            ImageStatus::Deleted => image.orphaned_at,
        };
        image.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ImageError> {
        Ok(self.images.lock().unwrap().remove(&id).is_some())
    }

    async fn list_overdue_orphans(&self, cutoff: DateTime<Utc>) -> Result<Vec<Image>, ImageError> {
        Ok(self
            .images
            .lock()
            .unwrap()
            .values()
            .filter(|i| {
                i.status == ImageStatus::Orphaned
                    && i.orphaned_at.is_some_and(|at| at <= cutoff)
            })
            .cloned()
            .collect())
    }

    async fn list_unreferenced_active(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Image>, ImageError> {
        let referenced: std::collections::HashSet<Uuid> = self
            .refs
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.image_id)
            .collect();
        Ok(self
            .images
            .lock()
            .unwrap()
            .values()
            .filter(|i| {
                i.status == ImageStatus::Active
                    && i.created_at <= cutoff
                    && !referenced.contains(&i.id)
            })
            .cloned()
            .collect())
    }
}

/// Reference table backed by a `Vec`.
pub(crate) struct MemoryReferenceRepository {
    refs: Arc<Mutex<Vec<ImageReference>>>,
}

impl MemoryReferenceRepository {
    pub(crate) fn new(refs: Arc<Mutex<Vec<ImageReference>>>) -> Self {
        Self { refs }
    }

    /// Snapshot of every reference row.
    pub(crate) fn all(&self) -> Vec<ImageReference> {
        self.refs.lock().unwrap().clone()
    }
}

impl ImageReferenceRepository for MemoryReferenceRepository {
    async fn create_if_absent(&self, input: CreateReferenceInput) -> Result<bool, ImageError> {
        let mut refs = self.refs.lock().unwrap();
        let exists = refs.iter().any(|r| {
            r.image_id == input.image_id
                && r.owner_entity_id == input.owner_entity_id
                && r.usage == input.usage
        });
        if exists {
            return Ok(false);
        }
        refs.push(ImageReference {
            id: Uuid::new_v4(),
            image_id: input.image_id,
            owner_entity_id: input.owner_entity_id,
            usage: input.usage,
            position: input.position,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn count_for_image(&self, image_id: Uuid) -> Result<u64, ImageError> {
        Ok(self
            .refs
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.image_id == image_id)
            .count() as u64)
    }

    async fn delete_one(
        &self,
        image_id: Uuid,
        owner_entity_id: Uuid,
        usage: ReferenceUsage,
    ) -> Result<bool, ImageError> {
        let mut refs = self.refs.lock().unwrap();
        let before = refs.len();
        refs.retain(|r| {
            !(r.image_id == image_id && r.owner_entity_id == owner_entity_id && r.usage == usage)
        });
        Ok(refs.len() < before)
    }

    async fn delete_for_entity(&self, owner_entity_id: Uuid) -> Result<Vec<Uuid>, ImageError> {
        let mut refs = self.refs.lock().unwrap();
        let mut removed: Vec<Uuid> = Vec::new();
        refs.retain(|r| {
            if r.owner_entity_id == owner_entity_id {
                if !removed.contains(&r.image_id) {
                    removed.push(r.image_id);
                }
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn delete_for_image(&self, image_id: Uuid) -> Result<u64, ImageError> {
        let mut refs = self.refs.lock().unwrap();
        let before = refs.len();
        refs.retain(|r| r.image_id != image_id);
        Ok((before - refs.len()) as u64)
    }

    async fn image_ids_for_entity(&self, owner_entity_id: Uuid) -> Result<Vec<Uuid>, ImageError> {
        let refs = self.refs.lock().unwrap();
        let mut ids: Vec<Uuid> = Vec::new();
        for r in refs.iter().filter(|r| r.owner_entity_id == owner_entity_id) {
            if !ids.contains(&r.image_id) {
                ids.push(r.image_id);
            }
        }
        Ok(ids)
    }
}

/// Image and reference repositories sharing one reference table.
pub(crate) fn memory_repos() -> (Arc<MemoryImageRepository>, Arc<MemoryReferenceRepository>) {
    let refs = Arc::new(Mutex::new(Vec::new()));
    (
        Arc::new(MemoryImageRepository::with_refs(refs.clone())),
        Arc::new(MemoryReferenceRepository::new(refs)),
    )
}

/// Provider whose deletes always fail, for reclaim-failure tests.
pub(crate) struct BrokenDeleteStore {
    inner: OpendalStore,
}

impl BrokenDeleteStore {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            inner: OpendalStore::in_memory(name).expect("memory store should build"),
        }
    }
}

#[async_trait]
impl ObjectStore for BrokenDeleteStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        self.inner.upload(key, data, content_type).await
    }

    fn url(&self, key: &str) -> String {
        self.inner.url(key)
    }

    async fn read(&self, key: &str) -> Result<Bytes, StorageError> {
        self.inner.read(key).await
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::operation("simulated delete failure"))
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        self.inner.metadata(key).await
    }
}
