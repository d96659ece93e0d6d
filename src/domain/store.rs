//! Entity store port and the generic keyed repository built on top of it
//!
//! The store only sees bytes keyed by `(EntityKind, id)`. Serialization and
//! error annotation live in [`Repository`], which is instantiated once per
//! entity kind.

use crate::domain::shared::{DomainError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Namespace of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    SipTrunk,
    SipDispatchRule,
    SipParticipant,
}

impl EntityKind {
    /// Name used as the storage namespace
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::SipTrunk => "sip_trunk",
            EntityKind::SipDispatchRule => "sip_dispatch_rule",
            EntityKind::SipParticipant => "sip_participant",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable keyed storage with read-after-write consistency on exact keys.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load the bytes stored under `id`, if any
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Vec<u8>>>;

    /// Insert a new record. Fails with `AlreadyExists` if the key is taken.
    async fn insert(&self, kind: EntityKind, id: &str, data: Vec<u8>) -> Result<()>;

    /// Remove a record. Returns whether a record was removed.
    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool>;

    /// All records of a kind, in ascending id order
    async fn list(&self, kind: EntityKind) -> Result<Vec<Vec<u8>>>;

    /// Whether the backing connection currently answers
    async fn ping(&self) -> Result<()>;
}

/// A record the registry can persist
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

/// Typed view of one entity kind inside an [`EntityStore`]
pub struct Repository<E: Entity> {
    store: Arc<dyn EntityStore>,
    _kind: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _kind: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    /// Persist a new record
    pub async fn insert(&self, entity: &E) -> Result<()> {
        let data = serde_json::to_vec(entity).map_err(|e| {
            DomainError::Internal(format!("{} {} encode: {}", E::KIND, entity.id(), e))
        })?;
        self.store
            .insert(E::KIND, entity.id(), data)
            .await
            .map_err(|e| e.context(format!("{} insert {}", E::KIND, entity.id())))
    }

    /// Load a record, failing with `NotFound` if it does not exist
    pub async fn load(&self, id: &str) -> Result<E> {
        match self.find(id).await? {
            Some(entity) => Ok(entity),
            None => Err(DomainError::NotFound(format!("{} {}", E::KIND, id))),
        }
    }

    /// Load a record if it exists
    pub async fn find(&self, id: &str) -> Result<Option<E>> {
        let data = self
            .store
            .get(E::KIND, id)
            .await
            .map_err(|e| e.context(format!("{} get {}", E::KIND, id)))?;

        data.map(|bytes| decode::<E>(&bytes)).transpose()
    }

    /// Remove a previously loaded record.
    ///
    /// A record removed concurrently since it was loaded reports `NotFound`.
    pub async fn delete(&self, entity: &E) -> Result<()> {
        let removed = self
            .store
            .delete(E::KIND, entity.id())
            .await
            .map_err(|e| e.context(format!("{} delete {}", E::KIND, entity.id())))?;

        if removed {
            Ok(())
        } else {
            Err(DomainError::NotFound(format!("{} {}", E::KIND, entity.id())))
        }
    }

    /// All records of this kind
    pub async fn list(&self) -> Result<Vec<E>> {
        let rows = self
            .store
            .list(E::KIND)
            .await
            .map_err(|e| e.context(format!("{} list", E::KIND)))?;

        rows.iter().map(|bytes| decode::<E>(bytes)).collect()
    }
}

fn decode<E: Entity>(bytes: &[u8]) -> Result<E> {
    serde_json::from_slice(bytes)
        .map_err(|e| DomainError::Internal(format!("{} decode: {}", E::KIND, e)))
}
