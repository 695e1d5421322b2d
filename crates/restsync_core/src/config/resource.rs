//! Per-resource configuration.

use crate::event::Event;
use crate::state::ResourceState;
use crate::types::{Attributes, QueryParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Shape of a resource: a keyed collection or a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// One record, held directly.
    Singular,
    /// An ordered collection of records.
    Plural,
}

impl ResourceKind {
    /// Returns true for collections.
    #[must_use]
    pub fn is_plural(self) -> bool {
        matches!(self, ResourceKind::Plural)
    }
}

/// Extra request options passed through to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchParams {
    /// Headers added to every request.
    pub headers: BTreeMap<String, String>,
}

impl FetchParams {
    /// Creates empty fetch params.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A response transformation hook.
pub type HookFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Response hook applied to successful responses.
///
/// Either one function for every response, or a pair selected by the
/// resource's kind.
#[derive(Clone)]
pub enum ResponseHook {
    /// Applied to every response.
    Uniform(HookFn),
    /// `collection` for plural resources, `member` for singular ones.
    PerKind {
        /// Hook for plural resources.
        collection: Option<HookFn>,
        /// Hook for singular resources.
        member: Option<HookFn>,
    },
}

impl ResponseHook {
    /// Creates a hook applied to every response.
    pub fn uniform<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self::Uniform(Arc::new(f))
    }

    /// Creates a hook that only runs for plural resources.
    pub fn collection<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self::PerKind {
            collection: Some(Arc::new(f)),
            member: None,
        }
    }

    /// Creates a hook that only runs for singular resources.
    pub fn member<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self::PerKind {
            collection: None,
            member: Some(Arc::new(f)),
        }
    }

    /// Runs the hook selected for `kind`, if any.
    #[must_use]
    pub fn apply(&self, kind: ResourceKind, value: &Value) -> Option<Value> {
        let hook = match self {
            ResponseHook::Uniform(f) => Some(f),
            ResponseHook::PerKind { collection, member } => match kind {
                ResourceKind::Plural => collection.as_ref(),
                ResourceKind::Singular => member.as_ref(),
            },
        };
        hook.map(|f| f(value))
    }
}

impl fmt::Debug for ResponseHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseHook::Uniform(_) => f.write_str("ResponseHook::Uniform(..)"),
            ResponseHook::PerKind { collection, member } => f
                .debug_struct("ResponseHook::PerKind")
                .field("collection", &collection.is_some())
                .field("member", &member.is_some())
                .finish(),
        }
    }
}

/// Handles events the built-in reconciliation does not.
pub trait CustomReducer: Send + Sync {
    /// Returns the next state of the resource.
    fn reduce(&self, state: &ResourceState, event: &Event) -> ResourceState;
}

impl<F> CustomReducer for F
where
    F: Fn(&ResourceState, &Event) -> ResourceState + Send + Sync,
{
    fn reduce(&self, state: &ResourceState, event: &Event) -> ResourceState {
        self(state, event)
    }
}

fn default_id_attribute() -> String {
    "id".to_string()
}

/// Configuration of one resource.
///
/// The serializable fields map to camelCase JSON keys. Hooks and the custom
/// reducer are attached with the builder methods.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Path of the resource below the base URL, e.g. `/posts`.
    pub controller: String,
    /// Collection or single record.
    pub kind: ResourceKind,
    /// Record field holding the server ID.
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    /// Seed records for plural resources.
    #[serde(default)]
    pub models: Vec<Attributes>,
    /// Seed attributes for singular resources.
    #[serde(default)]
    pub attributes: Option<Attributes>,
    /// Whether INDEX results are merged into the existing records.
    #[serde(default)]
    pub paginated: bool,
    /// Overrides the global base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Overrides the global fetch params.
    #[serde(default)]
    pub fetch_params: Option<FetchParams>,
    /// Query params sent with reads that carry none of their own.
    #[serde(default)]
    pub query_params: Option<QueryParams>,
    /// Overrides the global optimistic update setting.
    #[serde(default)]
    pub optimistic_update_enabled: Option<bool>,
    /// Issues requests immediately instead of one at a time.
    #[serde(default)]
    pub disable_fetch_queueing: bool,
    /// Transforms successful responses.
    #[serde(skip)]
    pub parse: Option<ResponseHook>,
    /// Derives metadata from successful responses.
    #[serde(skip)]
    pub set_metadata: Option<ResponseHook>,
    /// Handles custom events.
    #[serde(skip)]
    pub reducer: Option<Arc<dyn CustomReducer>>,
}

impl ResourceConfig {
    /// Creates a resource configuration.
    pub fn new(controller: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            controller: controller.into(),
            kind,
            id_attribute: default_id_attribute(),
            models: Vec::new(),
            attributes: None,
            paginated: false,
            base_url: None,
            fetch_params: None,
            query_params: None,
            optimistic_update_enabled: None,
            disable_fetch_queueing: false,
            parse: None,
            set_metadata: None,
            reducer: None,
        }
    }

    /// Creates a collection resource.
    pub fn plural(controller: impl Into<String>) -> Self {
        Self::new(controller, ResourceKind::Plural)
    }

    /// Creates a single-record resource.
    pub fn singular(controller: impl Into<String>) -> Self {
        Self::new(controller, ResourceKind::Singular)
    }

    /// Sets the ID attribute.
    #[must_use]
    pub fn with_id_attribute(mut self, id_attribute: impl Into<String>) -> Self {
        self.id_attribute = id_attribute.into();
        self
    }

    /// Sets the seed records.
    #[must_use]
    pub fn with_models(mut self, models: Vec<Attributes>) -> Self {
        self.models = models;
        self
    }

    /// Sets the seed attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Enables paginated INDEX merging.
    #[must_use]
    pub fn with_paginated(mut self, paginated: bool) -> Self {
        self.paginated = paginated;
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the fetch params.
    #[must_use]
    pub fn with_fetch_params(mut self, fetch_params: FetchParams) -> Self {
        self.fetch_params = Some(fetch_params);
        self
    }

    /// Sets the default query params.
    #[must_use]
    pub fn with_query_params(mut self, query_params: QueryParams) -> Self {
        self.query_params = Some(query_params);
        self
    }

    /// Enables or disables optimistic updates.
    #[must_use]
    pub fn with_optimistic_updates(mut self, enabled: bool) -> Self {
        self.optimistic_update_enabled = Some(enabled);
        self
    }

    /// Disables request queueing.
    #[must_use]
    pub fn with_queueing_disabled(mut self, disabled: bool) -> Self {
        self.disable_fetch_queueing = disabled;
        self
    }

    /// Sets the response parse hook.
    #[must_use]
    pub fn with_parse(mut self, hook: ResponseHook) -> Self {
        self.parse = Some(hook);
        self
    }

    /// Sets the metadata hook.
    #[must_use]
    pub fn with_set_metadata(mut self, hook: ResponseHook) -> Self {
        self.set_metadata = Some(hook);
        self
    }

    /// Sets the custom reducer.
    #[must_use]
    pub fn with_reducer<R: CustomReducer + 'static>(mut self, reducer: R) -> Self {
        self.reducer = Some(Arc::new(reducer));
        self
    }

    /// Returns true for collections.
    #[must_use]
    pub fn is_plural(&self) -> bool {
        self.kind.is_plural()
    }
}

impl fmt::Debug for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceConfig")
            .field("controller", &self.controller)
            .field("kind", &self.kind)
            .field("id_attribute", &self.id_attribute)
            .field("models", &self.models.len())
            .field("paginated", &self.paginated)
            .field("base_url", &self.base_url)
            .field("query_params", &self.query_params)
            .field("optimistic_update_enabled", &self.optimistic_update_enabled)
            .field("disable_fetch_queueing", &self.disable_fetch_queueing)
            .field("parse", &self.parse)
            .field("set_metadata", &self.set_metadata)
            .field("reducer", &self.reducer.is_some())
            .finish()
    }
}
