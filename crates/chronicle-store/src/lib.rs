//! Entity Store for the Chronicle simulation coordinator.
//!
//! A generic CRUD + query interface over the four entity kinds, with two
//! interchangeable backends. Callers hold an [`EntityStore`] and never see
//! which backend is active.
//!
//! # Architecture
//!
//! ```text
//! Repository<T: Entity>  -- typed CRUD, finders, serializer pair
//!     |
//! StoreBackend           -- enum dispatch over documents
//!     |-- LocalFileStore (single JSON file, write-through)
//!     +-- DocumentStore  (Dragonfly, one key per document)
//! ```
//!
//! # Modules
//!
//! - [`entity`] -- [`Entity`] trait, [`EntityKind`], document helpers
//! - [`backend`] -- [`StoreBackend`], [`EntityStore`], [`BackendConfig`]
//! - [`repository`] -- [`Repository`] and per-kind finders
//! - [`local`] -- Local write-through JSON file backend
//! - [`remote`] -- `Dragonfly` document backend
//! - [`error`] -- [`StoreError`] with operation context

pub mod backend;
pub mod entity;
pub mod error;
pub mod local;
pub mod remote;
pub mod repository;

// Re-export primary types for convenience.
pub use backend::{BackendConfig, EntityStore, StoreBackend};
pub use entity::{Document, Entity, EntityKind, Filters};
pub use error::{Operation, StoreError, StoreFailure};
pub use local::LocalFileStore;
pub use remote::DocumentStore;
pub use repository::Repository;
