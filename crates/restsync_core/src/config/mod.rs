//! Configuration for restsync.
//!
//! A [`Config`] declares the resources the store tracks and how requests
//! for them are issued. It is usually written as JSON, possibly split over
//! several fragments (see [`Config::combine`]); response hooks and custom
//! reducers are attached in code.

mod combine;
mod resource;

pub use combine::{ConfigFragment, ResourceGroup};
pub use resource::{
    CustomReducer, FetchParams, HookFn, ResourceConfig, ResourceKind, ResponseHook,
};

use crate::error::{CoreError, CoreResult};
use crate::state::StoreState;
use crate::types::QueryParams;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL prepended to every controller.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Fetch params used when neither the request nor the resource sets any.
    #[serde(default)]
    pub fetch_params: Option<FetchParams>,
    /// Query params used when neither the read nor the resource sets any.
    #[serde(default)]
    pub query_params: Option<QueryParams>,
    /// Global optimistic update setting.
    #[serde(default)]
    pub optimistic_update_enabled: Option<bool>,
    /// Disables request queueing for every resource.
    #[serde(default)]
    pub disable_fetch_queueing: bool,
    /// Resources by name.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceConfig>,
}

impl Config {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    ///
    /// Accepts a single configuration object or an array of fragments,
    /// which are combined in order.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let fragments: Vec<ConfigFragment> = match value {
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<_, _>>()?,
            other => vec![serde_json::from_value(other)?],
        };
        let config = Self::combine(fragments);
        config.validate()?;
        Ok(config)
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

    /// Disables request queueing for every resource.
    #[must_use]
    pub fn with_queueing_disabled(mut self, disabled: bool) -> Self {
        self.disable_fetch_queueing = disabled;
        self
    }

    /// Adds a resource.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, resource: ResourceConfig) -> Self {
        self.resources.insert(name.into(), resource);
        self
    }

    /// Checks every resource entry.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, resource) in &self.resources {
            if resource.id_attribute.is_empty() {
                return Err(CoreError::invalid_resource(name, "empty idAttribute"));
            }
            match resource.kind {
                ResourceKind::Plural if resource.attributes.is_some() => {
                    return Err(CoreError::invalid_resource(
                        name,
                        "plural resources are seeded with `models`",
                    ));
                }
                ResourceKind::Singular if !resource.models.is_empty() => {
                    return Err(CoreError::invalid_resource(
                        name,
                        "singular resources are seeded with `attributes`",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Looks up a resource.
    pub fn resource(&self, name: &str) -> CoreResult<&ResourceConfig> {
        self.resources
            .get(name)
            .ok_or_else(|| CoreError::unknown_resource(name))
    }

    /// Returns the base URL for a resource, or an empty string.
    #[must_use]
    pub fn base_url_for(&self, resource: &ResourceConfig) -> String {
        resource
            .base_url
            .as_ref()
            .or(self.base_url.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the fetch params for a request.
    ///
    /// The first of the request's override, the resource's and the global
    /// params wins; they are not merged.
    #[must_use]
    pub fn fetch_params_for(
        &self,
        resource: &ResourceConfig,
        request: Option<&FetchParams>,
    ) -> FetchParams {
        request
            .or(resource.fetch_params.as_ref())
            .or(self.fetch_params.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the query params for a read.
    ///
    /// Same precedence as [`fetch_params_for`](Self::fetch_params_for): the
    /// request's own params, else the resource's, else the global ones.
    #[must_use]
    pub fn query_params_for<'a>(
        &'a self,
        resource: &'a ResourceConfig,
        request: Option<&'a QueryParams>,
    ) -> Option<&'a QueryParams> {
        request
            .or(resource.query_params.as_ref())
            .or(self.query_params.as_ref())
    }

    /// Returns whether optimistic updates apply to a resource.
    #[must_use]
    pub fn optimistic_updates_for(&self, resource: &ResourceConfig) -> bool {
        resource
            .optimistic_update_enabled
            .or(self.optimistic_update_enabled)
            .unwrap_or(true)
    }

    /// Returns whether requests for a resource bypass the queue.
    #[must_use]
    pub fn queueing_disabled_for(&self, resource: &ResourceConfig) -> bool {
        self.disable_fetch_queueing || resource.disable_fetch_queueing
    }
}

/// Where a dispatcher reads its configuration from.
#[derive(Clone)]
pub enum ConfigSource {
    /// A fixed configuration.
    Static(Arc<Config>),
    /// Computed from the current state on every request.
    Resolver(Arc<dyn Fn(&StoreState) -> Config + Send + Sync>),
}

impl ConfigSource {
    /// Creates a source computed from the current state.
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(&StoreState) -> Config + Send + Sync + 'static,
    {
        Self::Resolver(Arc::new(f))
    }

    /// Returns the configuration for the given state.
    #[must_use]
    pub fn resolve(&self, state: &StoreState) -> Arc<Config> {
        match self {
            ConfigSource::Static(config) => Arc::clone(config),
            ConfigSource::Resolver(f) => Arc::new(f(state)),
        }
    }
}

impl From<Config> for ConfigSource {
    fn from(config: Config) -> Self {
        Self::Static(Arc::new(config))
    }
}

impl From<Arc<Config>> for ConfigSource {
    fn from(config: Arc<Config>) -> Self {
        Self::Static(config)
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Static(config) => f.debug_tuple("Static").field(config).finish(),
            ConfigSource::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_single_object() {
        let config = Config::from_json(
            r#"{
                "baseUrl": "http://api",
                "optimisticUpdateEnabled": false,
                "resources": {
                    "Posts": {"controller": "/posts", "kind": "plural"},
                    "User": {"controller": "/user", "kind": "singular", "baseUrl": "http://auth"}
                }
            }"#,
        )
        .unwrap();

        let posts = config.resource("Posts").unwrap();
        assert_eq!(config.base_url_for(posts), "http://api");
        assert!(!config.optimistic_updates_for(posts));

        let user = config.resource("User").unwrap();
        assert_eq!(config.base_url_for(user), "http://auth");
    }

    #[test]
    fn from_json_fragment_array() {
        let config = Config::from_json(
            r#"[
                {"baseUrl": "http://a", "resources": {"Posts": {"controller": "/posts", "kind": "plural"}}},
                {"resources": {"Tags": {"controller": "/tags", "kind": "plural"}}}
            ]"#,
        )
        .unwrap();

        assert_eq!(config.resources.len(), 2);
        assert_eq!(
            config.resource("Tags").unwrap().base_url.as_deref(),
            Some("http://a")
        );
    }

    #[test]
    fn from_json_rejects_bad_input() {
        assert!(matches!(Config::from_json("not json"), Err(CoreError::Json(_))));
        assert!(matches!(
            Config::from_json(
                r#"{"resources": {"User": {"controller": "/u", "kind": "singular", "models": [{"id": 1}]}}}"#
            ),
            Err(CoreError::InvalidResource { .. })
        ));
    }

    #[test]
    fn unknown_resource_lookup() {
        let config = Config::new();
        assert!(matches!(
            config.resource("Nope"),
            Err(CoreError::UnknownResource { .. })
        ));
    }

    #[test]
    fn fetch_params_precedence() {
        let global = FetchParams::new().with_header("X-Level", "global");
        let own = FetchParams::new().with_header("X-Level", "resource");
        let request = FetchParams::new().with_header("X-Level", "request");

        let config = Config::new()
            .with_fetch_params(global)
            .with_resource("A", ResourceConfig::plural("/a"))
            .with_resource("B", ResourceConfig::plural("/b").with_fetch_params(own));

        let a = config.resource("A").unwrap();
        let b = config.resource("B").unwrap();
        assert_eq!(config.fetch_params_for(a, None).headers["X-Level"], "global");
        assert_eq!(config.fetch_params_for(b, None).headers["X-Level"], "resource");
        assert_eq!(
            config.fetch_params_for(b, Some(&request)).headers["X-Level"],
            "request"
        );
    }

    #[test]
    fn query_params_precedence() {
        let global: QueryParams = json!({"per_page": 20}).as_object().cloned().unwrap();
        let own: QueryParams = json!({"per_page": 50}).as_object().cloned().unwrap();
        let request: QueryParams = json!({"page": 3}).as_object().cloned().unwrap();
        let config = Config::new().with_query_params(global.clone());
        let plain = ResourceConfig::plural("/posts");
        let tuned = ResourceConfig::plural("/tags").with_query_params(own.clone());

        assert_eq!(config.query_params_for(&plain, None), Some(&global));
        assert_eq!(config.query_params_for(&tuned, None), Some(&own));
        assert_eq!(config.query_params_for(&tuned, Some(&request)), Some(&request));
        assert_eq!(Config::new().query_params_for(&plain, None), None);
    }

    #[test]
    fn optimistic_and_queueing_resolution() {
        let config = Config::new()
            .with_optimistic_updates(false)
            .with_resource("A", ResourceConfig::plural("/a"))
            .with_resource("B", ResourceConfig::plural("/b").with_optimistic_updates(true));

        assert!(!config.optimistic_updates_for(config.resource("A").unwrap()));
        assert!(config.optimistic_updates_for(config.resource("B").unwrap()));
        assert!(Config::new().optimistic_updates_for(&ResourceConfig::plural("/x")));

        let a = ResourceConfig::plural("/a").with_queueing_disabled(true);
        assert!(Config::new().queueing_disabled_for(&a));
        assert!(Config::new()
            .with_queueing_disabled(true)
            .queueing_disabled_for(&ResourceConfig::plural("/b")));
    }

    #[test]
    fn resolver_source_sees_state() {
        let source = ConfigSource::resolver(|state: &StoreState| {
            let base = if state.get("Posts").is_some() { "http://seen" } else { "http://empty" };
            Config::new().with_base_url(base)
        });

        let config = source.resolve(&StoreState::default());
        assert_eq!(config.base_url.as_deref(), Some("http://empty"));
    }
}
