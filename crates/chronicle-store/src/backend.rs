//! Backend selection and the [`EntityStore`] facade.
//!
//! Uses enum dispatch instead of trait objects because async methods are
//! not dyn-compatible. Nothing above [`EntityStore`] knows which variant is
//! active.

use std::path::PathBuf;
use std::sync::Arc;

use chronicle_types::{Action, Actor, Event, Simulation};
use tracing::info;

use crate::entity::{Document, Entity, EntityKind, Filters};
use crate::error::{Operation, StoreError, StoreFailure};
use crate::local::LocalFileStore;
use crate::remote::DocumentStore;
use crate::repository::Repository;

/// Which backend to build and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Single JSON file at `path`.
    Local {
        /// Data file location.
        path: PathBuf,
    },
    /// `Dragonfly` at `url`, keys prefixed with `namespace`.
    Remote {
        /// Redis-scheme URL.
        url: String,
        /// Key prefix.
        namespace: String,
    },
}

/// A concrete storage backend.
pub enum StoreBackend {
    /// Local write-through JSON file.
    Local(LocalFileStore),
    /// Remote `Dragonfly` document store.
    Remote(DocumentStore),
}

impl StoreBackend {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local-file",
            Self::Remote(_) => "dragonfly",
        }
    }

    pub(crate) async fn put(
        &self,
        kind: EntityKind,
        id: &str,
        doc: Document,
    ) -> Result<(), StoreFailure> {
        match self {
            Self::Local(store) => store.put(kind, id, doc).await,
            Self::Remote(store) => store.put(kind, id, doc).await,
        }
    }

    pub(crate) async fn fetch(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<Document>, StoreFailure> {
        match self {
            Self::Local(store) => Ok(store.fetch(kind, id).await),
            Self::Remote(store) => store.fetch(kind, id).await,
        }
    }

    pub(crate) async fn merge(
        &self,
        kind: EntityKind,
        id: &str,
        patch: Document,
    ) -> Result<bool, StoreFailure> {
        match self {
            Self::Local(store) => store.merge(kind, id, patch).await,
            Self::Remote(store) => store.merge(kind, id, patch).await,
        }
    }

    pub(crate) async fn remove(&self, kind: EntityKind, id: &str) -> Result<bool, StoreFailure> {
        match self {
            Self::Local(store) => store.remove(kind, id).await,
            Self::Remote(store) => store.remove(kind, id).await,
        }
    }

    pub(crate) async fn scan(
        &self,
        kind: EntityKind,
        filters: &Filters,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreFailure> {
        match self {
            Self::Local(store) => Ok(store.scan(kind, filters, limit).await),
            Self::Remote(store) => store.scan(kind, filters, limit).await,
        }
    }

    pub(crate) async fn contains(&self, kind: EntityKind, id: &str) -> Result<bool, StoreFailure> {
        match self {
            Self::Local(store) => Ok(store.contains(kind, id).await),
            Self::Remote(store) => store.contains(kind, id).await,
        }
    }

    pub(crate) async fn clear(&self, kind: EntityKind) -> Result<usize, StoreFailure> {
        match self {
            Self::Local(store) => store.clear(kind).await,
            Self::Remote(store) => store.clear(kind).await,
        }
    }
}

/// Shared handle to the Entity Store.
///
/// Cheap to clone. Typed access goes through [`Repository`] views obtained
/// from [`EntityStore::repo`] or the per-kind shorthands.
#[derive(Clone)]
pub struct EntityStore {
    backend: Arc<StoreBackend>,
}

impl EntityStore {
    /// Wrap an already-built backend.
    pub fn new(backend: StoreBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Build the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] with [`Operation::Open`] if the local file's
    /// directory cannot be created or the remote connection fails.
    pub async fn open(config: &BackendConfig) -> Result<Self, StoreError> {
        let backend = match config {
            BackendConfig::Local { path } => StoreBackend::Local(
                LocalFileStore::open(path.clone())
                    .await
                    .map_err(|e| StoreError::new(Operation::Open, EntityKind::Simulation, None, e))?,
            ),
            BackendConfig::Remote { url, namespace } => StoreBackend::Remote(
                DocumentStore::connect(url, namespace.clone())
                    .await
                    .map_err(|e| StoreError::new(Operation::Open, EntityKind::Simulation, None, e))?,
            ),
        };
        info!(backend = backend.name(), "entity store ready");
        Ok(Self::new(backend))
    }

    /// An in-process store backed by a fresh file under the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the temp directory cannot be created.
    pub async fn temporary(label: &str) -> Result<Self, StoreError> {
        let dir = std::env::temp_dir().join(format!(
            "chronicle_{label}_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        ));
        Self::open(&BackendConfig::Local {
            path: dir.join("state.json"),
        })
        .await
    }

    /// The active backend's name.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// A typed view over the collection for `T`.
    pub fn repo<T: Entity>(&self) -> Repository<'_, T> {
        Repository::new(&self.backend)
    }

    /// Simulation records.
    pub fn simulations(&self) -> Repository<'_, Simulation> {
        self.repo()
    }

    /// Actor records.
    pub fn actors(&self) -> Repository<'_, Actor> {
        self.repo()
    }

    /// Event records.
    pub fn events(&self) -> Repository<'_, Event> {
        self.repo()
    }

    /// Action records.
    pub fn actions(&self) -> Repository<'_, Action> {
        self.repo()
    }

    /// Flush or disconnect the backend.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the final flush or disconnect fails.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let result = match self.backend.as_ref() {
            StoreBackend::Local(store) => store.sync().await,
            StoreBackend::Remote(store) => store.quit().await,
        };
        result.map_err(|e| StoreError::new(Operation::Close, EntityKind::Simulation, None, e))?;
        info!(backend = self.backend.name(), "entity store shut down");
        Ok(())
    }
}
