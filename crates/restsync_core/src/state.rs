//! Store state.
//!
//! State values are immutable: transitions build new values and share
//! untouched parts (`Arc` per resource and per slot) with the previous
//! snapshot.

use crate::config::{Config, ResourceConfig, ResourceKind};
use crate::error::LoadingError;
use crate::types::{Attributes, ClientId, QueryParams, ResourceId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One record and its request bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntitySlot {
    /// Server ID, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    /// Client ID, for records created locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    /// Record fields.
    pub attributes: Attributes,
    /// A request for this record is in flight.
    pub loading: bool,
    /// Error of the last failed request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_error: Option<LoadingError>,
    /// Attributes before the pending optimistic change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<Attributes>,
    /// Query parameters of the last read request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_params: Option<QueryParams>,
    /// Metadata of the last successful response.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub meta: Attributes,
}

impl EntitySlot {
    /// Creates an empty slot addressed by `id` and `client_id`.
    #[must_use]
    pub fn new(id: Option<ResourceId>, client_id: Option<ClientId>) -> Self {
        Self {
            id,
            client_id,
            ..Self::default()
        }
    }

    /// Creates a slot from a server record, keyed by its ID attribute.
    #[must_use]
    pub fn from_record(record: Attributes, id_attribute: &str) -> Self {
        let id = record.get(id_attribute).and_then(ResourceId::from_value);
        Self {
            id,
            attributes: record,
            ..Self::default()
        }
    }
}

/// An ordered collection of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Collection {
    /// Records in server order.
    pub models: Vec<Arc<EntitySlot>>,
    /// An INDEX request is in flight.
    pub loading: bool,
    /// Error of the last failed INDEX request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_error: Option<LoadingError>,
    /// Query parameters of the last INDEX request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_params: Option<QueryParams>,
    /// Metadata of the last successful INDEX response.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub meta: Attributes,
}

impl Collection {
    /// Creates a collection from records.
    #[must_use]
    pub fn from_models(models: Vec<EntitySlot>) -> Self {
        Self {
            models: models.into_iter().map(Arc::new).collect(),
            ..Self::default()
        }
    }

    /// Returns the position of the slot addressed by `id`, else by `client_id`.
    #[must_use]
    pub fn position(&self, id: Option<&ResourceId>, client_id: Option<ClientId>) -> Option<usize> {
        id.and_then(|id| self.models.iter().position(|m| m.id.as_ref() == Some(id)))
            .or_else(|| {
                client_id.and_then(|cid| self.models.iter().position(|m| m.client_id == Some(cid)))
            })
    }

    /// Returns the slot addressed by `id`, else by `client_id`.
    #[must_use]
    pub fn find(&self, id: Option<&ResourceId>, client_id: Option<ClientId>) -> Option<&EntitySlot> {
        self.position(id, client_id).map(|i| self.models[i].as_ref())
    }

    /// Returns the slot with this server ID.
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&EntitySlot> {
        self.find(Some(id), None)
    }

    /// Returns the slot with this client ID.
    #[must_use]
    pub fn by_client_id(&self, client_id: ClientId) -> Option<&EntitySlot> {
        self.find(None, Some(client_id))
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Returns the server IDs in order, skipping records without one.
    #[must_use]
    pub fn ids(&self) -> Vec<ResourceId> {
        self.models.iter().filter_map(|m| m.id.clone()).collect()
    }
}

/// State of one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceState {
    /// A single record; `None` once destroyed.
    Singular(Option<EntitySlot>),
    /// A collection.
    Plural(Collection),
}

impl ResourceState {
    /// Builds the initial state from the seed data of a resource.
    #[must_use]
    pub fn initial(resource: &ResourceConfig) -> Self {
        match resource.kind {
            ResourceKind::Plural => ResourceState::Plural(Collection::from_models(
                resource
                    .models
                    .iter()
                    .map(|m| EntitySlot::from_record(m.clone(), &resource.id_attribute))
                    .collect(),
            )),
            ResourceKind::Singular => ResourceState::Singular(Some(
                resource
                    .attributes
                    .clone()
                    .map(|a| EntitySlot::from_record(a, &resource.id_attribute))
                    .unwrap_or_default(),
            )),
        }
    }

    /// Returns the collection of a plural resource.
    #[must_use]
    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            ResourceState::Plural(c) => Some(c),
            ResourceState::Singular(_) => None,
        }
    }

    /// Returns the record of a singular resource.
    #[must_use]
    pub fn as_singleton(&self) -> Option<&EntitySlot> {
        match self {
            ResourceState::Singular(slot) => slot.as_ref(),
            ResourceState::Plural(_) => None,
        }
    }

    /// Returns true for a destroyed singular resource.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        matches!(self, ResourceState::Singular(None))
    }
}

/// State of every configured resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StoreState {
    resources: BTreeMap<String, Arc<ResourceState>>,
}

impl StoreState {
    /// Builds the initial state of every resource in `config`.
    #[must_use]
    pub fn initial(config: &Config) -> Self {
        Self {
            resources: config
                .resources
                .iter()
                .map(|(name, rc)| (name.clone(), Arc::new(ResourceState::initial(rc))))
                .collect(),
        }
    }

    /// Returns the state of a resource.
    #[must_use]
    pub fn get(&self, resource: &str) -> Option<&ResourceState> {
        self.resources.get(resource).map(Arc::as_ref)
    }

    /// Returns the shared state of a resource.
    #[must_use]
    pub fn shared(&self, resource: &str) -> Option<Arc<ResourceState>> {
        self.resources.get(resource).cloned()
    }

    /// Returns the collection of a plural resource.
    #[must_use]
    pub fn collection(&self, resource: &str) -> Option<&Collection> {
        self.get(resource).and_then(ResourceState::as_collection)
    }

    /// Returns the record of a singular resource.
    #[must_use]
    pub fn singleton(&self, resource: &str) -> Option<&EntitySlot> {
        self.get(resource).and_then(ResourceState::as_singleton)
    }

    /// Returns the resource names.
    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Returns a new state with one resource replaced.
    #[must_use]
    pub fn with_resource(&self, resource: impl Into<String>, state: ResourceState) -> Self {
        let mut resources = self.resources.clone();
        resources.insert(resource.into(), Arc::new(state));
        Self { resources }
    }
}
