//! Local write-through JSON file backend.
//!
//! The whole dataset lives in memory and in a single file:
//!
//! ```text
//! {
//!   "actions":     { "<id>": { ...fields } },
//!   "actors":      { ... },
//!   "events":      { ... },
//!   "simulations": { ... }
//! }
//! ```
//!
//! Every mutating call rewrites the entire file before returning. The new
//! dataset is written to a temporary sibling and renamed into place, and the
//! in-memory working set is replaced only after that succeeds, so a failed
//! flush leaves both the file and later readers on the previous state.
//! A single async mutex guards the working set, so flushes never
//! interleave.
//!
//! Listing returns documents in insertion order for the lifetime of the
//! process. On disk the collections are keyed maps with sorted keys, so a
//! reopened store lists in id order.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entity::{Document, EntityKind, Filters, matches, merge};
use crate::error::StoreFailure;

/// One collection: documents plus their insertion order.
#[derive(Debug, Clone, Default)]
struct Collection {
    order: Vec<String>,
    docs: HashMap<String, Document>,
}

impl Collection {
    fn from_disk(map: BTreeMap<String, Document>) -> Self {
        let order = map.keys().cloned().collect();
        Self {
            order,
            docs: map.into_iter().collect(),
        }
    }

    fn to_disk(&self) -> BTreeMap<&str, &Document> {
        self.docs.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    fn put(&mut self, id: &str, doc: Document) {
        if self.docs.insert(id.to_owned(), doc).is_none() {
            self.order.push(id.to_owned());
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.docs.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
            true
        } else {
            false
        }
    }

    fn ordered(&self) -> impl Iterator<Item = &Document> {
        self.order.iter().filter_map(|id| self.docs.get(id))
    }
}

/// The full in-memory dataset.
#[derive(Debug, Clone, Default)]
struct Dataset {
    simulations: Collection,
    actors: Collection,
    events: Collection,
    actions: Collection,
}

impl Dataset {
    const fn collection(&self, kind: EntityKind) -> &Collection {
        match kind {
            EntityKind::Simulation => &self.simulations,
            EntityKind::Actor => &self.actors,
            EntityKind::Event => &self.events,
            EntityKind::Action => &self.actions,
        }
    }

    const fn collection_mut(&mut self, kind: EntityKind) -> &mut Collection {
        match kind {
            EntityKind::Simulation => &mut self.simulations,
            EntityKind::Actor => &mut self.actors,
            EntityKind::Event => &mut self.events,
            EntityKind::Action => &mut self.actions,
        }
    }

    /// Parse the persisted layout. Unknown top-level keys are ignored.
    fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let mut raw: BTreeMap<String, Value> = serde_json::from_value(value)?;
        let mut dataset = Self::default();
        for kind in EntityKind::ALL {
            if let Some(section) = raw.remove(kind.collection()) {
                let map: BTreeMap<String, Document> = serde_json::from_value(section)?;
                *dataset.collection_mut(kind) = Collection::from_disk(map);
            }
        }
        Ok(dataset)
    }

    fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let layout: BTreeMap<&str, BTreeMap<&str, &Document>> = EntityKind::ALL
            .iter()
            .map(|kind| (kind.collection(), self.collection(*kind).to_disk()))
            .collect();
        serde_json::to_vec_pretty(&layout)
    }
}

/// Write-through JSON file store.
#[derive(Debug)]
pub struct LocalFileStore {
    path: PathBuf,
    state: Mutex<Dataset>,
}

impl LocalFileStore {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// An unreadable or corrupt file is logged and ignored; the store starts
    /// empty and the next write replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreFailure::Io`] if the parent directory cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreFailure> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let dataset = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes).and_then(Dataset::from_json)
            {
                Ok(dataset) => dataset,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt store file");
                    Dataset::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Dataset::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable store file");
                Dataset::default()
            }
        };

        info!(
            path = %path.display(),
            simulations = dataset.simulations.order.len(),
            actors = dataset.actors.order.len(),
            events = dataset.events.order.len(),
            actions = dataset.actions.order.len(),
            "local store opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(dataset),
        })
    }

    /// The data file this store writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `dataset` to disk through a temporary sibling file.
    async fn flush(&self, dataset: &Dataset) -> Result<(), StoreFailure> {
        let bytes = dataset.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "local store flushed");
        Ok(())
    }

    /// Apply `change` to a copy of the dataset, flush it, then commit.
    ///
    /// `change` returns its result and whether anything was modified;
    /// unmodified datasets are not flushed.
    async fn mutate<R>(
        &self,
        change: impl FnOnce(&mut Dataset) -> (R, bool),
    ) -> Result<R, StoreFailure> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        let (result, modified) = change(&mut next);
        if modified {
            self.flush(&next).await?;
            *guard = next;
        }
        Ok(result)
    }

    /// Insert or replace a document.
    pub async fn put(&self, kind: EntityKind, id: &str, doc: Document) -> Result<(), StoreFailure> {
        self.mutate(|data| {
            data.collection_mut(kind).put(id, doc);
            ((), true)
        })
        .await
    }

    /// Fetch a document by id.
    pub async fn fetch(&self, kind: EntityKind, id: &str) -> Option<Document> {
        self.state.lock().await.collection(kind).docs.get(id).cloned()
    }

    /// Merge `patch` into an existing document. Returns `false` if absent.
    pub async fn merge(
        &self,
        kind: EntityKind,
        id: &str,
        patch: Document,
    ) -> Result<bool, StoreFailure> {
        self.mutate(|data| match data.collection_mut(kind).docs.get_mut(id) {
            Some(doc) => {
                merge(doc, patch);
                (true, true)
            }
            None => (false, false),
        })
        .await
    }

    /// Remove a document. Returns `false` if absent.
    pub async fn remove(&self, kind: EntityKind, id: &str) -> Result<bool, StoreFailure> {
        self.mutate(|data| {
            let removed = data.collection_mut(kind).remove(id);
            (removed, removed)
        })
        .await
    }

    /// Documents matching `filters`, in insertion order, up to `limit`.
    pub async fn scan(
        &self,
        kind: EntityKind,
        filters: &Filters,
        limit: Option<usize>,
    ) -> Vec<Document> {
        let guard = self.state.lock().await;
        guard
            .collection(kind)
            .ordered()
            .filter(|doc| matches(doc, filters))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Whether a document with `id` exists.
    pub async fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.state.lock().await.collection(kind).docs.contains_key(id)
    }

    /// Drop every document of `kind`.
    pub async fn clear(&self, kind: EntityKind) -> Result<usize, StoreFailure> {
        self.mutate(|data| {
            let collection = data.collection_mut(kind);
            let removed = collection.order.len();
            *collection = Collection::default();
            (removed, removed > 0)
        })
        .await
    }

    /// Rewrite the data file from the current working set.
    pub async fn sync(&self) -> Result<(), StoreFailure> {
        let guard = self.state.lock().await;
        self.flush(&guard).await
    }
}
