//! Events consumed by the store.
//!
//! Every state transition is driven by an [`Event`]: a resource name plus an
//! [`Action`]. Request intents double as the "start" event of a request;
//! terminal outcomes arrive as [`Action::Success`] or [`Action::Failure`].

use crate::config::FetchParams;
use crate::error::LoadingError;
use crate::types::{Attributes, ClientId, QueryParams, ResourceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// REST operation of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    /// List a collection.
    Index,
    /// Fetch one record.
    Show,
    /// Create a record.
    Create,
    /// Update a record.
    Update,
    /// Delete a record.
    Destroy,
}

impl Verb {
    /// Returns the upper-case name of the verb.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Index => "INDEX",
            Verb::Show => "SHOW",
            Verb::Create => "CREATE",
            Verb::Update => "UPDATE",
            Verb::Destroy => "DESTROY",
        }
    }

    /// Returns true for verbs that do not modify the server.
    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, Verb::Index | Verb::Show)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Operation to perform.
    pub verb: Verb,
    /// Target record, for member operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    /// Intended attributes for create and update.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    /// Query parameters for read requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<QueryParams>,
    /// Replaces the configured controller path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    /// Replaces the configured fetch params.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_params: Option<FetchParams>,
}

impl Request {
    /// Creates a request for `verb`.
    #[must_use]
    pub fn new(verb: Verb) -> Self {
        Self {
            verb,
            id: None,
            attributes: Attributes::new(),
            query_params: None,
            controller: None,
            fetch_params: None,
        }
    }

    /// Returns the target ID: the explicit one, else the ID attribute of
    /// the intended attributes.
    #[must_use]
    pub fn target_id(&self, id_attribute: &str) -> Option<ResourceId> {
        self.id.clone().or_else(|| {
            self.attributes
                .get(id_attribute)
                .and_then(ResourceId::from_value)
        })
    }
}

/// Payload of a successful request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Success {
    /// Server ID of the affected record.
    pub id: Option<ResourceId>,
    /// Client ID of the affected record, for creates.
    pub client_id: Option<ClientId>,
    /// Response body after the parse hook.
    pub response: Value,
    /// Output of the metadata hook.
    #[serde(default)]
    pub meta: Attributes,
}

impl Success {
    /// Creates a success payload.
    #[must_use]
    pub fn new(response: Value) -> Self {
        Self {
            id: None,
            client_id: None,
            response,
            meta: Attributes::new(),
        }
    }

    /// Sets the server ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ResourceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the client ID.
    #[must_use]
    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Attributes) -> Self {
        self.meta = meta;
        self
    }
}

/// Payload of a failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// Server ID of the affected record.
    pub id: Option<ResourceId>,
    /// Client ID of the affected record, for creates.
    pub client_id: Option<ClientId>,
    /// What went wrong.
    pub error: LoadingError,
}

impl Failure {
    /// Creates a failure payload.
    #[must_use]
    pub fn new(error: LoadingError) -> Self {
        Self {
            id: None,
            client_id: None,
            error,
        }
    }

    /// Sets the server ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ResourceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the client ID.
    #[must_use]
    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }
}

/// A record addressed by server ID and/or client ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Server ID.
    pub id: Option<ResourceId>,
    /// Client ID.
    pub client_id: Option<ClientId>,
}

impl Target {
    /// Creates a target.
    #[must_use]
    pub fn new(id: Option<ResourceId>, client_id: Option<ClientId>) -> Self {
        Self { id, client_id }
    }

    /// Targets a server ID.
    pub fn id(id: impl Into<ResourceId>) -> Self {
        Self::new(Some(id.into()), None)
    }

    /// Targets a client ID.
    #[must_use]
    pub fn client(client_id: ClientId) -> Self {
        Self::new(None, Some(client_id))
    }
}

/// What happened to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// A request was issued.
    Request(Request),
    /// A request succeeded.
    Success {
        /// Verb of the request.
        verb: Verb,
        /// Outcome.
        #[serde(flatten)]
        success: Success,
    },
    /// A request failed.
    Failure {
        /// Verb of the request.
        verb: Verb,
        /// Outcome.
        #[serde(flatten)]
        failure: Failure,
    },
    /// A client ID was allocated for a record about to be created.
    AssignClientId {
        /// The allocated ID.
        client_id: ClientId,
    },
    /// A record is loading.
    SetLoading(Target),
    /// Intended attributes were applied ahead of the server.
    SetOptimisticData {
        /// The record.
        #[serde(flatten)]
        target: Target,
        /// Attributes merged into the record.
        data: Attributes,
    },
    /// An optimistic change is withdrawn.
    UnsetOptimisticData {
        /// The record.
        #[serde(flatten)]
        target: Target,
        /// Remove the record instead of restoring it.
        destroy: bool,
    },
    /// Application-defined event handled by a custom reducer.
    Custom {
        /// Event name.
        name: String,
        /// Event payload.
        payload: Value,
    },
}

/// An event addressed to one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Name of the resource.
    pub resource: String,
    /// What happened.
    pub action: Action,
}

impl Event {
    /// Creates an event.
    pub fn new(resource: impl Into<String>, action: Action) -> Self {
        Self {
            resource: resource.into(),
            action,
        }
    }

    /// Creates an INDEX intent.
    pub fn index(resource: impl Into<String>) -> Self {
        Self::new(resource, Action::Request(Request::new(Verb::Index)))
    }

    /// Creates a SHOW intent.
    pub fn show(resource: impl Into<String>) -> Self {
        Self::new(resource, Action::Request(Request::new(Verb::Show)))
    }

    /// Creates a CREATE intent with the attributes of the new record.
    pub fn create(resource: impl Into<String>, attributes: Attributes) -> Self {
        let mut request = Request::new(Verb::Create);
        request.attributes = attributes;
        Self::new(resource, Action::Request(request))
    }

    /// Creates an UPDATE intent with the changed attributes.
    pub fn update(resource: impl Into<String>, attributes: Attributes) -> Self {
        let mut request = Request::new(Verb::Update);
        request.attributes = attributes;
        Self::new(resource, Action::Request(request))
    }

    /// Creates a DESTROY intent.
    pub fn destroy(resource: impl Into<String>) -> Self {
        Self::new(resource, Action::Request(Request::new(Verb::Destroy)))
    }

    /// Creates an application-defined event.
    pub fn custom(resource: impl Into<String>, name: impl Into<String>, payload: Value) -> Self {
        Self::new(
            resource,
            Action::Custom {
                name: name.into(),
                payload,
            },
        )
    }

    /// Creates a success event.
    pub fn success(resource: impl Into<String>, verb: Verb, success: Success) -> Self {
        Self::new(resource, Action::Success { verb, success })
    }

    /// Creates a failure event.
    pub fn failure(resource: impl Into<String>, verb: Verb, failure: Failure) -> Self {
        Self::new(resource, Action::Failure { verb, failure })
    }

    /// Sets the target ID of a request.
    ///
    /// For update intents the ID is also taken from the attributes when
    /// present, so this is only needed when they omit it.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ResourceId>) -> Self {
        if let Action::Request(request) = &mut self.action {
            request.id = Some(id.into());
        }
        self
    }

    /// Sets the query parameters of a request.
    #[must_use]
    pub fn with_query_params(mut self, query_params: QueryParams) -> Self {
        if let Action::Request(request) = &mut self.action {
            request.query_params = Some(query_params);
        }
        self
    }

    /// Replaces the controller path for this request only.
    #[must_use]
    pub fn with_controller(mut self, controller: impl Into<String>) -> Self {
        if let Action::Request(request) = &mut self.action {
            request.controller = Some(controller.into());
        }
        self
    }

    /// Replaces the fetch params for this request only.
    #[must_use]
    pub fn with_fetch_params(mut self, fetch_params: FetchParams) -> Self {
        if let Action::Request(request) = &mut self.action {
            request.fetch_params = Some(fetch_params);
        }
        self
    }

    /// Returns the request intent, if this is one.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        match &self.action {
            Action::Request(request) => Some(request),
            _ => None,
        }
    }

    /// Returns the event type name, e.g. `INDEX_SUCCESS`.
    #[must_use]
    pub fn type_name(&self) -> String {
        match &self.action {
            Action::Request(request) => request.verb.as_str().to_string(),
            Action::Success { verb, .. } => format!("{verb}_SUCCESS"),
            Action::Failure { verb, .. } => format!("{verb}_ERROR"),
            Action::AssignClientId { .. } => "ASSIGN_CID".to_string(),
            Action::SetLoading(_) => "SET_LOADING".to_string(),
            Action::SetOptimisticData { .. } => "SET_OPTIMISTIC_DATA".to_string(),
            Action::UnsetOptimisticData { .. } => "UNSET_OPTIMISTIC_DATA".to_string(),
            Action::Custom { name, .. } => name.clone(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn display_names() {
        assert_eq!(Event::index("Posts").to_string(), "Posts.INDEX");
        assert_eq!(
            Event::success("Posts", Verb::Create, Success::new(json!({}))).to_string(),
            "Posts.CREATE_SUCCESS"
        );
        assert_eq!(
            Event::failure("Posts", Verb::Show, Failure::new(LoadingError::Parse("x".into())))
                .to_string(),
            "Posts.SHOW_ERROR"
        );
        assert_eq!(
            Event::new("Posts", Action::AssignClientId { client_id: ClientId(1) }).to_string(),
            "Posts.ASSIGN_CID"
        );
        assert_eq!(
            Event::custom("Posts", "CLEAR", Value::Null).to_string(),
            "Posts.CLEAR"
        );
    }

    #[test]
    fn builders_fill_the_request() {
        let mut query = QueryParams::new();
        query.insert("page".into(), json!(2));

        let event = Event::update("Posts", attrs(json!({"title": "x"})))
            .with_id(5)
            .with_query_params(query.clone())
            .with_controller("/v2/posts")
            .with_fetch_params(FetchParams::new().with_header("A", "b"));

        let request = event.request().unwrap();
        assert_eq!(request.verb, Verb::Update);
        assert_eq!(request.id, Some(ResourceId::Int(5)));
        assert_eq!(request.attributes["title"], json!("x"));
        assert_eq!(request.query_params, Some(query));
        assert_eq!(request.controller.as_deref(), Some("/v2/posts"));
        assert!(request.fetch_params.is_some());
    }

    #[test]
    fn builders_ignore_non_requests() {
        let event = Event::custom("Posts", "CLEAR", Value::Null).with_id(1);
        assert!(event.request().is_none());
        assert_eq!(event.action, Action::Custom { name: "CLEAR".into(), payload: Value::Null });
    }

    #[test]
    fn target_id_falls_back_to_attributes() {
        let event = Event::update("Posts", attrs(json!({"uuid": "p-1"})));
        assert_eq!(
            event.request().unwrap().target_id("uuid"),
            Some(ResourceId::from("p-1"))
        );
        assert_eq!(event.request().unwrap().target_id("id"), None);

        let event = event.with_id(2);
        assert_eq!(event.request().unwrap().target_id("uuid"), Some(ResourceId::Int(2)));
    }

    #[test]
    fn verb_classification() {
        assert!(Verb::Index.is_read());
        assert!(Verb::Show.is_read());
        assert!(!Verb::Create.is_read());
        assert!(!Verb::Destroy.is_read());
    }

    #[test]
    fn events_serialize() {
        let event = Event::success(
            "Posts",
            Verb::Show,
            Success::new(json!({"id": 1})).with_id(1),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["resource"], json!("Posts"));
        assert_eq!(value["action"]["type"], json!("success"));
        assert_eq!(value["action"]["verb"], json!("SHOW"));
        assert_eq!(value["action"]["id"], json!(1));
    }
}
