//! Typed CRUD and query access to one entity collection.
//!
//! [`Repository`] is generic over the [`Entity`] it serves; the typed
//! finders at the bottom of this module are inherent impls on the concrete
//! instantiations.

use std::marker::PhantomData;

use chronicle_types::{
    Action, ActionPriority, ActionStatus, ActionType, Actor, ActorType, Event, EventStatus,
    EventType, Simulation, SimulationStatus,
};
use serde_json::Value;

use crate::backend::StoreBackend;
use crate::entity::{Document, Entity, Filters, ensure_timestamps, lookup_path, stamp_update};
use crate::error::{Operation, StoreError, StoreFailure};

/// Typed view over the collection holding `T`.
pub struct Repository<'a, T> {
    backend: &'a StoreBackend,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T: Entity> Repository<'a, T> {
    pub(crate) const fn new(backend: &'a StoreBackend) -> Self {
        Self {
            backend,
            _entity: PhantomData,
        }
    }

    fn err(operation: Operation, id: Option<&str>, cause: impl Into<StoreFailure>) -> StoreError {
        StoreError::new(operation, T::KIND, id, cause)
    }

    fn decode_all(operation: Operation, docs: Vec<Document>) -> Result<Vec<T>, StoreError> {
        docs.into_iter()
            .map(|doc| T::decode(doc).map_err(|e| Self::err(operation, None, e)))
            .collect()
    }

    /// Store `entity`, replacing any record with the same id.
    ///
    /// Fills `created_at`/`updated_at` when the encoded document lacks them.
    /// Returns the entity's id.
    pub async fn create(&self, entity: &T) -> Result<String, StoreError> {
        let id = entity.entity_id().to_owned();
        let mut doc = entity
            .encode()
            .map_err(|e| Self::err(Operation::Create, Some(&id), e))?;
        ensure_timestamps(&mut doc);
        self.backend
            .put(T::KIND, &id, doc)
            .await
            .map_err(|e| Self::err(Operation::Create, Some(&id), e))?;
        Ok(id)
    }

    /// Fetch by id. Absent records are `Ok(None)`, never an error.
    pub async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        let doc = self
            .backend
            .fetch(T::KIND, id)
            .await
            .map_err(|e| Self::err(Operation::Get, Some(id), e))?;
        doc.map(T::decode)
            .transpose()
            .map_err(|e| Self::err(Operation::Get, Some(id), e))
    }

    /// Merge top-level `fields` into an existing record.
    ///
    /// Returns `false`, with no side effect, when `id` does not exist.
    /// `updated_at` is refreshed unless `fields` sets it.
    pub async fn update(&self, id: &str, mut fields: Document) -> Result<bool, StoreError> {
        stamp_update(&mut fields);
        self.backend
            .merge(T::KIND, id, fields)
            .await
            .map_err(|e| Self::err(Operation::Update, Some(id), e))
    }

    /// Write every field of `entity` over the existing record.
    ///
    /// Returns `false` when the record no longer exists.
    pub async fn save(&self, entity: &T) -> Result<bool, StoreError> {
        let id = entity.entity_id();
        let doc = entity
            .encode()
            .map_err(|e| Self::err(Operation::Update, Some(id), e))?;
        self.update(id, doc).await
    }

    /// Delete by id. Returns `false` if absent.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.backend
            .remove(T::KIND, id)
            .await
            .map_err(|e| Self::err(Operation::Delete, Some(id), e))
    }

    /// Every record, in backend order, up to `limit`.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<T>, StoreError> {
        let docs = self
            .backend
            .scan(T::KIND, &Filters::new(), limit)
            .await
            .map_err(|e| Self::err(Operation::List, None, e))?;
        Self::decode_all(Operation::List, docs)
    }

    /// Records whose top-level fields equal every filter, up to `limit`.
    pub async fn query(&self, filters: &Filters, limit: Option<usize>) -> Result<Vec<T>, StoreError> {
        let docs = self
            .backend
            .scan(T::KIND, filters, limit)
            .await
            .map_err(|e| Self::err(Operation::Query, None, e))?;
        Self::decode_all(Operation::Query, docs)
    }

    /// Whether a record with `id` exists.
    pub async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        self.backend
            .contains(T::KIND, id)
            .await
            .map_err(|e| Self::err(Operation::Exists, Some(id), e))
    }

    /// Delete every record in the collection. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        self.backend
            .clear(T::KIND)
            .await
            .map_err(|e| Self::err(Operation::Clear, None, e))
    }

    /// Shorthand for a single-field equality query.
    async fn find_eq(
        &self,
        field: &str,
        value: impl Into<Value>,
        limit: Option<usize>,
    ) -> Result<Vec<T>, StoreError> {
        let mut filters = Filters::new();
        filters.insert(field.to_owned(), value.into());
        self.query(&filters, limit).await
    }

    /// Fetch every record and keep those matching `keep`, up to `limit`.
    async fn find_where(
        &self,
        limit: Option<usize>,
        keep: impl Fn(&T) -> bool,
    ) -> Result<Vec<T>, StoreError> {
        let all = self.list(None).await?;
        Ok(all
            .into_iter()
            .filter(|entity| keep(entity))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Typed finders
// ---------------------------------------------------------------------------

impl Repository<'_, Simulation> {
    /// Simulations with the given status.
    pub async fn find_by_status(
        &self,
        status: SimulationStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Simulation>, StoreError> {
        self.find_eq("status", status.as_str(), limit).await
    }

    /// Simulations seeded by the given scenario key.
    pub async fn find_by_scenario(
        &self,
        scenario_key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Simulation>, StoreError> {
        self.find_eq("scenario_key", scenario_key, limit).await
    }

    /// Simulations currently running.
    pub async fn find_running(&self, limit: Option<usize>) -> Result<Vec<Simulation>, StoreError> {
        self.find_by_status(SimulationStatus::Running, limit).await
    }

    /// Simulations that have completed.
    pub async fn find_completed(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<Simulation>, StoreError> {
        self.find_by_status(SimulationStatus::Completed, limit).await
    }

    /// The first simulation with exactly this name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Simulation>, StoreError> {
        Ok(self.find_eq("name", name, Some(1)).await?.into_iter().next())
    }
}

impl Repository<'_, Actor> {
    /// Actors of the given type.
    pub async fn find_by_type(
        &self,
        actor_type: ActorType,
        limit: Option<usize>,
    ) -> Result<Vec<Actor>, StoreError> {
        self.find_eq("type", actor_type.as_str(), limit).await
    }

    /// The first actor with exactly this name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Actor>, StoreError> {
        Ok(self.find_eq("name", name, Some(1)).await?.into_iter().next())
    }

    /// Active actors.
    pub async fn find_active(&self, limit: Option<usize>) -> Result<Vec<Actor>, StoreError> {
        self.find_eq("active", true, limit).await
    }

    /// Actors whose location has `value` at the dotted `path`.
    ///
    /// Nested paths are not supported by the generic query layer, so this
    /// fetches every actor and filters client-side.
    pub async fn find_in_location(
        &self,
        path: &str,
        value: &Value,
        limit: Option<usize>,
    ) -> Result<Vec<Actor>, StoreError> {
        self.find_where(limit, |actor| {
            actor.location.as_ref().is_some_and(|loc| {
                let loc = Value::Object(loc.clone().into_iter().collect());
                lookup_path(&loc, path) == Some(value)
            })
        })
        .await
    }

    /// Actors listing `affiliation` among their affiliations.
    pub async fn find_by_affiliation(
        &self,
        affiliation: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Actor>, StoreError> {
        self.find_where(limit, |actor| {
            actor.affiliations.iter().any(|a| a == affiliation)
        })
        .await
    }
}

impl Repository<'_, Event> {
    /// Events with the given status.
    pub async fn find_by_status(
        &self,
        status: EventStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Event>, StoreError> {
        self.find_eq("status", status.as_str(), limit).await
    }

    /// Events of the given type.
    pub async fn find_by_type(
        &self,
        event_type: EventType,
        limit: Option<usize>,
    ) -> Result<Vec<Event>, StoreError> {
        self.find_eq("type", event_type.as_str(), limit).await
    }

    /// Events affecting the given actor.
    pub async fn find_by_actor(
        &self,
        actor_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Event>, StoreError> {
        self.find_where(limit, |event| {
            event.affected_actors.iter().any(|a| a.as_str() == actor_id)
        })
        .await
    }
}

impl Repository<'_, Action> {
    /// Actions submitted by the given actor.
    pub async fn find_by_actor(
        &self,
        actor_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Action>, StoreError> {
        self.find_eq("actor_id", actor_id, limit).await
    }

    /// Actions with the given status.
    pub async fn find_by_status(
        &self,
        status: ActionStatus,
        limit: Option<usize>,
    ) -> Result<Vec<Action>, StoreError> {
        self.find_eq("status", status.as_str(), limit).await
    }

    /// Actions of the given type.
    pub async fn find_by_type(
        &self,
        action_type: ActionType,
        limit: Option<usize>,
    ) -> Result<Vec<Action>, StoreError> {
        self.find_eq("type", action_type.as_str(), limit).await
    }

    /// Actions with the given priority.
    pub async fn find_by_priority(
        &self,
        priority: ActionPriority,
        limit: Option<usize>,
    ) -> Result<Vec<Action>, StoreError> {
        self.find_eq("priority", priority.as_str(), limit).await
    }
}
