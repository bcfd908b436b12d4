// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory object store.
//!
//! Backs the embedded server and every test. Resource versions come from a
//! single counter shared by all kinds, so version ordering is global.

use anvil_core::{
    BmcJob, Clock, Hardware, IdGen, Object, Pipeline, SystemClock, UuidIdGen, Workflow,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::store::{ObjectStore, StoreError, WatchEvent};

/// Buffered watch events per kind before a slow subscriber starts lagging.
const WATCH_CAPACITY: usize = 256;

struct Bucket<T: Object> {
    objects: HashMap<String, T>,
    tx: broadcast::Sender<WatchEvent<T>>,
}

impl<T: Object> Default for Bucket<T> {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            objects: HashMap::new(),
            tx,
        }
    }
}

impl<T: Object> Bucket<T> {
    fn get(&self, namespace: &str, name: &str) -> Result<T, StoreError> {
        self.objects
            .get(&format!("{}/{}", namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: T::KIND,
                key: format!("{}/{}", namespace, name),
            })
    }

    fn list(&self, namespace: &str) -> Vec<T> {
        let mut items: Vec<T> = self
            .objects
            .values()
            .filter(|o| o.meta().namespace == namespace)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.meta().name.cmp(&b.meta().name));
        items
    }

    fn create(&mut self, mut object: T, version: u64, uid: String) -> Result<T, StoreError> {
        validate(&object)?;
        let key = object.key();
        if self.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: T::KIND, key });
        }
        {
            let meta = object.meta_mut();
            meta.uid = uid;
            meta.resource_version = version;
        }
        self.objects.insert(key, object.clone());
        let _ = self.tx.send(WatchEvent::Applied(object.clone()));
        Ok(object)
    }

    fn put(&mut self, mut object: T, version: u64) -> Result<T, StoreError> {
        validate(&object)?;
        let key = object.key();
        let current = self
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: T::KIND,
                key: key.clone(),
            })?
            .meta()
            .resource_version;
        let presented = object.meta().resource_version;
        if presented != current {
            return Err(StoreError::Conflict {
                kind: T::KIND,
                key,
                presented,
                current,
            });
        }
        object.meta_mut().resource_version = version;
        self.objects.insert(key, object.clone());
        let _ = self.tx.send(WatchEvent::Applied(object.clone()));
        Ok(object)
    }

    fn delete(
        &mut self,
        namespace: &str,
        name: &str,
        version: u64,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), StoreError> {
        let key = format!("{}/{}", namespace, name);
        let mut object = self
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: T::KIND,
                key: key.clone(),
            })?;

        if object.begin_deletion(now) {
            object.meta_mut().resource_version = version;
            self.objects.insert(key, object.clone());
            let _ = self.tx.send(WatchEvent::Applied(object));
        } else {
            self.objects.remove(&key);
            let _ = self.tx.send(WatchEvent::Deleted(object));
        }
        Ok(())
    }
}

fn validate<T: Object>(object: &T) -> Result<(), StoreError> {
    object
        .meta()
        .validate()
        .and_then(|_| object.validate())
        .map_err(|e| StoreError::Invalid(e.to_string()))
}

#[derive(Default)]
struct Inner {
    hardware: Bucket<Hardware>,
    workflows: Bucket<Workflow>,
    pipelines: Bucket<Pipeline>,
    bmc_jobs: Bucket<BmcJob>,
    next_resource_version: u64,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.next_resource_version += 1;
        self.next_resource_version
    }
}

/// In-memory [`ObjectStore`] for Hardware, Workflow, Pipeline, and BmcJob.
pub struct MemoryStore<C: Clock = SystemClock, G: IdGen = UuidIdGen> {
    inner: Arc<Mutex<Inner>>,
    clock: C,
    ids: G,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_deps(SystemClock, UuidIdGen)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock, G: IdGen> MemoryStore<C, G> {
    /// Build a store with explicit clock and ID generation, for tests that
    /// need stable UIDs or controlled deletion timestamps.
    pub fn with_deps(clock: C, ids: G) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
            ids,
        }
    }
}

impl<C: Clock, G: IdGen> Clone for MemoryStore<C, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            clock: self.clock.clone(),
            ids: self.ids.clone(),
        }
    }
}

macro_rules! impl_object_store {
    ($kind:ty, $bucket:ident) => {
        #[async_trait]
        impl<C: Clock, G: IdGen> ObjectStore<$kind> for MemoryStore<C, G> {
            async fn get(&self, namespace: &str, name: &str) -> Result<$kind, StoreError> {
                self.inner.lock().$bucket.get(namespace, name)
            }

            async fn list(&self, namespace: &str) -> Result<Vec<$kind>, StoreError> {
                Ok(self.inner.lock().$bucket.list(namespace))
            }

            async fn create(&self, object: $kind) -> Result<$kind, StoreError> {
                let uid = self.ids.next();
                let mut inner = self.inner.lock();
                let version = inner.next_version();
                inner.$bucket.create(object, version, uid)
            }

            async fn update(&self, object: $kind) -> Result<$kind, StoreError> {
                let mut inner = self.inner.lock();
                let version = inner.next_version();
                inner.$bucket.put(object, version)
            }

            async fn update_status(&self, object: $kind) -> Result<$kind, StoreError> {
                let mut inner = self.inner.lock();
                let version = inner.next_version();
                inner.$bucket.put(object, version)
            }

            async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
                let now = self.clock.now();
                let mut inner = self.inner.lock();
                let version = inner.next_version();
                inner.$bucket.delete(namespace, name, version, now)
            }

            fn watch(&self) -> broadcast::Receiver<WatchEvent<$kind>> {
                self.inner.lock().$bucket.tx.subscribe()
            }
        }
    };
}

impl_object_store!(Hardware, hardware);
impl_object_store!(Workflow, workflows);
impl_object_store!(Pipeline, pipelines);
impl_object_store!(BmcJob, bmc_jobs);

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
