//! Remote document-store backend on `Dragonfly` (Redis-compatible).
//!
//! Each document is a JSON string under its own key. Insertion order per
//! collection is kept in a list so listing is stable. Query filters are
//! evaluated client-side after the fetch. Atomicity is per document only:
//! a merge is a read followed by a write.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `{ns}:{collection}:doc:{id}` | JSON | One entity document |
//! | `{ns}:{collection}:index` | List | Entity ids in insertion order |
//!
//! Documents live under their own `doc:` segment so no caller-supplied id
//! can land on the index key.

use fred::prelude::*;
use tracing::{debug, info};

use crate::entity::{Document, EntityKind, Filters, matches, merge};
use crate::error::StoreFailure;

/// Connection handle to a `Dragonfly` instance holding entity documents.
#[derive(Clone)]
pub struct DocumentStore {
    client: Client,
    namespace: String,
}

impl DocumentStore {
    /// Connect to `Dragonfly` at `url` (`redis://host:port[/db]`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreFailure::Config`] if the URL cannot be parsed.
    /// Returns [`StoreFailure::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, StoreFailure> {
        let config = Config::from_url(url)
            .map_err(|e| StoreFailure::Config(format!("invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        let namespace = namespace.into();
        info!(namespace = namespace, "connected to Dragonfly document store");
        Ok(Self { client, namespace })
    }

    fn doc_key(&self, kind: EntityKind, id: &str) -> String {
        doc_key(&self.namespace, kind, id)
    }

    fn index_key(&self, kind: EntityKind) -> String {
        index_key(&self.namespace, kind)
    }

    async fn write(&self, key: &str, doc: &Document) -> Result<(), StoreFailure> {
        let json = serde_json::to_string(doc)?;
        let _: () = self.client.set(key, json.as_str(), None, None, false).await?;
        Ok(())
    }

    /// Insert or replace a document.
    pub async fn put(&self, kind: EntityKind, id: &str, doc: Document) -> Result<(), StoreFailure> {
        let key = self.doc_key(kind, id);
        let existed: u32 = self.client.exists(&key).await?;
        self.write(&key, &doc).await?;
        if existed == 0 {
            let _: u64 = self.client.rpush(self.index_key(kind), id).await?;
        }
        debug!(key, "document stored");
        Ok(())
    }

    /// Fetch a document by id.
    pub async fn fetch(&self, kind: EntityKind, id: &str) -> Result<Option<Document>, StoreFailure> {
        let value: Option<String> = self.client.get(self.doc_key(kind, id)).await?;
        match value {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Merge `patch` into an existing document. Returns `false` if absent.
    pub async fn merge(
        &self,
        kind: EntityKind,
        id: &str,
        patch: Document,
    ) -> Result<bool, StoreFailure> {
        let Some(mut doc) = self.fetch(kind, id).await? else {
            return Ok(false);
        };
        merge(&mut doc, patch);
        self.write(&self.doc_key(kind, id), &doc).await?;
        Ok(true)
    }

    /// Remove a document. Returns `false` if absent.
    pub async fn remove(&self, kind: EntityKind, id: &str) -> Result<bool, StoreFailure> {
        let deleted: u32 = self.client.del(self.doc_key(kind, id)).await?;
        let _: u64 = self.client.lrem(self.index_key(kind), 0, id).await?;
        Ok(deleted > 0)
    }

    /// Documents matching `filters`, in insertion order, up to `limit`.
    pub async fn scan(
        &self,
        kind: EntityKind,
        filters: &Filters,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreFailure> {
        let ids: Vec<String> = self.client.lrange(self.index_key(kind), 0, -1).await?;
        let limit = limit.unwrap_or(usize::MAX);
        let mut docs = Vec::new();
        for id in &ids {
            if docs.len() >= limit {
                break;
            }
            // Ids whose document vanished between the two reads are skipped.
            if let Some(doc) = self.fetch(kind, id).await?
                && matches(&doc, filters)
            {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Whether a document with `id` exists.
    pub async fn contains(&self, kind: EntityKind, id: &str) -> Result<bool, StoreFailure> {
        let count: u32 = self.client.exists(self.doc_key(kind, id)).await?;
        Ok(count > 0)
    }

    /// Drop every document of `kind`. Returns how many were removed.
    pub async fn clear(&self, kind: EntityKind) -> Result<usize, StoreFailure> {
        let index = self.index_key(kind);
        let ids: Vec<String> = self.client.lrange(&index, 0, -1).await?;
        let mut removed = 0_usize;
        for id in &ids {
            let deleted: u32 = self.client.del(self.doc_key(kind, id)).await?;
            if deleted > 0 {
                removed = removed.saturating_add(1);
            }
        }
        let _: u32 = self.client.del(&index).await?;
        Ok(removed)
    }

    /// Close the connection.
    pub async fn quit(&self) -> Result<(), StoreFailure> {
        self.client.quit().await?;
        Ok(())
    }
}

fn doc_key(namespace: &str, kind: EntityKind, id: &str) -> String {
    format!("{namespace}:{}:doc:{id}", kind.collection())
}

fn index_key(namespace: &str, kind: EntityKind) -> String {
    format!("{namespace}:{}:index", kind.collection())
}
