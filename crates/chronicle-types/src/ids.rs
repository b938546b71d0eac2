//! Type-safe string identifiers for every stored entity.
//!
//! Entity ids are human-readable strings (`sim-3fa2c1d0`, `actor-mayor`)
//! rather than raw UUIDs because scenario authors pick stable ids for seeded
//! content. Generated ids take a short hex slice of a UUID v4 behind a
//! per-kind prefix.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Return the first `len` hex characters of a fresh UUID v4.
fn short_hex(len: usize) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex.get(..len).map_or_else(|| hex.clone(), ToOwned::to_owned)
}

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, prefix = $prefix:literal, hex_len = $len:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh identifier with the kind prefix.
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, short_hex($len)))
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`] value.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a simulation run.
    SimulationId, prefix = "sim", hex_len = 8
}

define_id! {
    /// Unique identifier for an actor (player, NPC, organization, entity).
    ActorId, prefix = "actor", hex_len = 8
}

define_id! {
    /// Unique identifier for an event.
    EventId, prefix = "event", hex_len = 8
}

define_id! {
    /// Unique identifier for an actor-initiated action.
    ActionId, prefix = "act", hex_len = 10
}
