//! The [`Entity`] trait and the document model shared by every backend.
//!
//! Backends store untyped [`Document`]s grouped into one collection per
//! [`EntityKind`]. The trait supplies the serializer pair that moves a typed
//! entity in and out of that representation.

use core::fmt;
use std::collections::BTreeMap;

use chrono::Utc;
use chronicle_types::{Action, Actor, Event, Simulation};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A stored record: a JSON object keyed by top-level field name.
pub type Document = serde_json::Map<String, Value>;

/// Exact-equality filters on top-level document fields.
pub type Filters = BTreeMap<String, Value>;

/// The four entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// [`Simulation`] records.
    Simulation,
    /// [`Actor`] records.
    Actor,
    /// [`Event`] records.
    Event,
    /// [`Action`] records.
    Action,
}

impl EntityKind {
    /// Every kind, in persisted-layout order.
    pub const ALL: [Self; 4] = [Self::Simulation, Self::Actor, Self::Event, Self::Action];

    /// Name of the collection that holds this kind.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Simulation => "simulations",
            Self::Actor => "actors",
            Self::Event => "events",
            Self::Action => "actions",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Simulation => "simulation",
            Self::Actor => "actor",
            Self::Event => "event",
            Self::Action => "action",
        };
        f.write_str(name)
    }
}

/// A typed record that can be kept in the Entity Store.
///
/// `encode`/`decode` default to `serde_json`; an entity only overrides them
/// when its stored shape differs from its serde shape.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// The collection this entity lives in.
    const KIND: EntityKind;

    /// The entity's string id.
    fn entity_id(&self) -> &str;

    /// Convert the entity into a stored document.
    fn encode(&self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "{} did not serialize to an object: {other}",
                Self::KIND
            ))),
        }
    }

    /// Rebuild the entity from a stored document.
    fn decode(doc: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(doc))
    }
}

impl Entity for Simulation {
    const KIND: EntityKind = EntityKind::Simulation;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Entity for Actor {
    const KIND: EntityKind = EntityKind::Actor;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Entity for Event {
    const KIND: EntityKind = EntityKind::Event;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Entity for Action {
    const KIND: EntityKind = EntityKind::Action;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Set `created_at` and `updated_at` to now when either is absent or null.
pub fn ensure_timestamps(doc: &mut Document) {
    let now = Value::String(Utc::now().to_rfc3339());
    for field in ["created_at", "updated_at"] {
        let missing = doc.get(field).is_none_or(Value::is_null);
        if missing {
            doc.insert(field.to_owned(), now.clone());
        }
    }
}

/// Set `updated_at` to now unless the patch already carries it.
pub fn stamp_update(patch: &mut Document) {
    if !patch.contains_key("updated_at") {
        patch.insert(
            "updated_at".to_owned(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }
}

/// Merge `patch` into `doc`, replacing top-level fields.
pub fn merge(doc: &mut Document, patch: Document) {
    for (key, value) in patch {
        doc.insert(key, value);
    }
}

/// Whether every filter equals the document's top-level field.
pub fn matches(doc: &Document, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(field, expected)| doc.get(field) == Some(expected))
}

/// Follow a dotted path (`"coordinates.x"`) through nested objects.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_types::{ActorId, ActorType};

    #[test]
    fn actor_encode_decode_preserves_fields() {
        let mut actor = Actor::new(ActorId::from("actor-1"), "Ana", ActorType::Player);
        actor.affiliations.push("guild".to_owned());
        let doc = actor.encode().unwrap_or_default();
        assert_eq!(doc.get("type"), Some(&Value::from("player")));
        let back = Actor::decode(doc).ok();
        assert_eq!(back, Some(actor));
    }

    #[test]
    fn ensure_timestamps_fills_only_missing() {
        let mut doc = Document::new();
        doc.insert("created_at".to_owned(), Value::from("2026-01-01T00:00:00Z"));
        doc.insert("updated_at".to_owned(), Value::Null);
        ensure_timestamps(&mut doc);
        assert_eq!(
            doc.get("created_at"),
            Some(&Value::from("2026-01-01T00:00:00Z"))
        );
        assert!(doc.get("updated_at").is_some_and(Value::is_string));
    }

    #[test]
    fn matches_requires_exact_top_level_equality() {
        let mut doc = Document::new();
        doc.insert("status".to_owned(), Value::from("running"));
        doc.insert("nested".to_owned(), serde_json::json!({"a": 1}));

        let mut filters = Filters::new();
        filters.insert("status".to_owned(), Value::from("running"));
        assert!(matches(&doc, &filters));

        filters.insert("nested.a".to_owned(), Value::from(1));
        assert!(!matches(&doc, &filters));
    }

    #[test]
    fn lookup_path_walks_nested_objects() {
        let value = serde_json::json!({"coordinates": {"x": 4}, "name": "Clinic"});
        assert_eq!(lookup_path(&value, "coordinates.x"), Some(&Value::from(4)));
        assert_eq!(lookup_path(&value, "name"), Some(&Value::from("Clinic")));
        assert_eq!(lookup_path(&value, "coordinates.y"), None);
    }
}
