//! Combining configuration fragments.
//!
//! Applications often split their resources over several configuration
//! objects, for example one per API host. A fragment may carry group-level
//! `baseUrl` and `optimisticUpdateEnabled` values inside its `resources`
//! object that apply to every resource declared next to them.

use super::{Config, FetchParams, ResourceConfig};
use crate::types::QueryParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resources declared by one fragment, with group-level defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    /// Base URL for resources of this group without their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Optimistic update setting for resources of this group without their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimistic_update_enabled: Option<bool>,
    /// Resources by name.
    #[serde(flatten)]
    pub entries: BTreeMap<String, ResourceConfig>,
}

impl ResourceGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the group base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the group optimistic update setting.
    #[must_use]
    pub fn with_optimistic_updates(mut self, enabled: bool) -> Self {
        self.optimistic_update_enabled = Some(enabled);
        self
    }

    /// Adds a resource.
    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, resource: ResourceConfig) -> Self {
        self.entries.insert(name.into(), resource);
        self
    }
}

/// One configuration object as written by the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFragment {
    /// Global base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Global fetch params.
    #[serde(default)]
    pub fetch_params: Option<FetchParams>,
    /// Global default query params.
    #[serde(default)]
    pub query_params: Option<QueryParams>,
    /// Global optimistic update setting.
    #[serde(default)]
    pub optimistic_update_enabled: Option<bool>,
    /// Disables request queueing for every resource.
    #[serde(default)]
    pub disable_fetch_queueing: bool,
    /// Resources declared by this fragment.
    #[serde(default)]
    pub resources: ResourceGroup,
}

impl ConfigFragment {
    /// Creates an empty fragment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the global base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the global optimistic update setting.
    #[must_use]
    pub fn with_optimistic_updates(mut self, enabled: bool) -> Self {
        self.optimistic_update_enabled = Some(enabled);
        self
    }

    /// Sets the resources.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourceGroup) -> Self {
        self.resources = resources;
        self
    }
}

impl Config {
    /// Combines fragments into one configuration.
    ///
    /// The first fragment supplies the top-level settings. Resources from
    /// every fragment are added in order, so a later fragment replaces an
    /// earlier resource of the same name. A resource without a base URL or
    /// optimistic update setting takes its group's value, then the first
    /// fragment's top-level value; the optimistic setting defaults to `true`.
    pub fn combine<I>(fragments: I) -> Config
    where
        I: IntoIterator<Item = ConfigFragment>,
    {
        let mut fragments = fragments.into_iter();
        let Some(first) = fragments.next() else {
            return Config::default();
        };

        let default_base_url = first.base_url.clone();
        let default_optimistic = first.optimistic_update_enabled;
        let mut config = Config {
            base_url: first.base_url,
            fetch_params: first.fetch_params,
            query_params: first.query_params,
            optimistic_update_enabled: first.optimistic_update_enabled,
            disable_fetch_queueing: first.disable_fetch_queueing,
            resources: BTreeMap::new(),
        };

        for group in std::iter::once(first.resources).chain(fragments.map(|f| f.resources)) {
            for (name, mut resource) in group.entries {
                if resource.base_url.is_none() {
                    resource.base_url = group
                        .base_url
                        .clone()
                        .or_else(|| default_base_url.clone());
                }
                if resource.optimistic_update_enabled.is_none() {
                    resource.optimistic_update_enabled = Some(
                        group
                            .optimistic_update_enabled
                            .or(default_optimistic)
                            .unwrap_or(true),
                    );
                }
                config.resources.insert(name, resource);
            }
        }

        config
    }
}
