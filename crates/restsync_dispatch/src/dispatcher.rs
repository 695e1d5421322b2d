//! Request orchestration.
//!
//! The [`Dispatcher`] turns request intents into transport calls. For each
//! intent it emits the bookkeeping events (client ID, loading marker,
//! optimistic data), forwards the intent itself as the start event, and
//! issues the request through the resource's queue. The outcome is reported
//! back to the container as a success or failure event.

use crate::error::{DispatchError, DispatchResult};
use crate::queue::FetchQueue;
use crate::transport::{Transport, TransportRequest, TransportResponse};
use crate::url::{build_url, UrlParts};
use restsync_core::{
    Action, Attributes, ClientId, ConfigSource, Event, Failure, LoadingError, Request,
    ResourceConfig, ResourceId, ResourceKind, ResponseHook, StateContainer, Success, Target, Verb,
};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Allocates client IDs, starting at 1.
#[derive(Debug, Default)]
pub struct ClientIdAllocator {
    last: AtomicU64,
}

impl ClientIdAllocator {
    /// Creates a new allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh client ID.
    pub fn allocate(&self) -> ClientId {
        ClientId(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Returns the most recently allocated ID.
    pub fn last(&self) -> Option<ClientId> {
        match self.last.load(Ordering::SeqCst) {
            0 => None,
            n => Some(ClientId(n)),
        }
    }
}

/// Result of a successful request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    /// Name of the resource.
    pub resource: String,
    /// Verb of the request.
    pub verb: Verb,
    /// Server ID of the record.
    pub id: Option<ResourceId>,
    /// Client ID of the record, for creates.
    pub client_id: Option<ClientId>,
    /// Response body after the parse hook.
    pub response: Value,
    /// Output of the metadata hook.
    pub meta: Attributes,
}

/// A request that has been issued or queued.
#[derive(Debug)]
pub struct PendingFetch {
    resource: String,
    verb: Verb,
    client_id: Option<ClientId>,
    rx: oneshot::Receiver<DispatchResult<Completed>>,
}

impl PendingFetch {
    /// Returns the name of the resource.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns the verb of the request.
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Returns the client ID allocated for a create.
    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    /// Waits for the terminal event of the request.
    ///
    /// State is updated whether or not this is awaited.
    pub async fn outcome(self) -> DispatchResult<Completed> {
        self.rx.await.unwrap_or(Err(DispatchError::Abandoned))
    }
}

/// What [`Dispatcher::dispatch`] did with an event.
#[derive(Debug)]
pub enum Dispatch {
    /// Passed to the container without side effects.
    Forwarded,
    /// A request was issued or queued.
    Pending(PendingFetch),
}

impl Dispatch {
    /// Returns the pending request, if one was started.
    pub fn pending(self) -> Option<PendingFetch> {
        match self {
            Dispatch::Pending(pending) => Some(pending),
            Dispatch::Forwarded => None,
        }
    }

    /// Returns true if the event had no side effects.
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Dispatch::Forwarded)
    }
}

struct Job {
    resource: String,
    verb: Verb,
    request: TransportRequest,
    id: Option<ResourceId>,
    client_id: Option<ClientId>,
    id_attribute: String,
    kind: ResourceKind,
    parse: Option<ResponseHook>,
    set_metadata: Option<ResponseHook>,
    optimistic: bool,
    reply: oneshot::Sender<DispatchResult<Completed>>,
}

struct Inner<C, T> {
    source: ConfigSource,
    container: Arc<C>,
    transport: T,
    queue: FetchQueue<Job>,
    client_ids: ClientIdAllocator,
}

/// Issues requests for intents and reports their outcomes as events.
///
/// Each dispatcher owns its queue and client ID counter; two dispatchers
/// never share either.
pub struct Dispatcher<C, T> {
    inner: Arc<Inner<C, T>>,
}

impl<C, T> Clone for Dispatcher<C, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, T> Dispatcher<C, T>
where
    C: StateContainer + 'static,
    T: Transport + 'static,
{
    /// Creates a dispatcher.
    pub fn new(source: impl Into<ConfigSource>, container: Arc<C>, transport: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                source: source.into(),
                container,
                transport,
                queue: FetchQueue::new(),
                client_ids: ClientIdAllocator::new(),
            }),
        }
    }

    /// Returns the container.
    pub fn container(&self) -> &Arc<C> {
        &self.inner.container
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Returns the number of requests waiting or running for a resource.
    pub fn queue_len(&self, resource: &str) -> usize {
        self.inner.queue.len(resource)
    }

    /// Dispatches an event.
    ///
    /// Events other than request intents, and intents for resources the
    /// configuration does not know, are forwarded to the container
    /// unchanged. Intents must be dispatched from within a tokio runtime.
    ///
    /// Errors are returned before any event is emitted.
    pub fn dispatch(&self, event: Event) -> DispatchResult<Dispatch> {
        let inner = &self.inner;
        let Some(request) = event.request() else {
            inner.container.dispatch(event);
            return Ok(Dispatch::Forwarded);
        };

        let config = inner.source.resolve(&inner.container.snapshot());
        let Some(rc) = config.resources.get(&event.resource) else {
            inner.container.dispatch(event);
            return Ok(Dispatch::Forwarded);
        };
        let handle = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;

        let verb = request.verb;
        let id = request.target_id(&rc.id_attribute);
        let query = config
            .query_params_for(rc, request.query_params.as_ref())
            .cloned();
        // Reads without their own params record the defaults they were sent with.
        let inherits_query = verb.is_read() && request.query_params.is_none();
        let base_url = config.base_url_for(rc);
        let url = build_url(UrlParts {
            resource: &event.resource,
            base_url: &base_url,
            controller: request.controller.as_deref().unwrap_or(&rc.controller),
            verb,
            kind: rc.kind,
            id: id.as_ref(),
            query: query.as_ref(),
        })?;
        let body = request_body(rc, request, id.as_ref())?;
        let fetch_params = config.fetch_params_for(rc, request.fetch_params.as_ref());
        let transport_request = TransportRequest {
            method: verb.into(),
            url,
            headers: fetch_params.headers.into_iter().collect(),
            body,
        };

        let resource = event.resource.clone();
        let optimistic =
            matches!(verb, Verb::Create | Verb::Update) && config.optimistic_updates_for(rc);

        let client_id = (verb == Verb::Create).then(|| {
            let client_id = inner.client_ids.allocate();
            inner.container.dispatch(Event::new(
                resource.clone(),
                Action::AssignClientId { client_id },
            ));
            inner.container.dispatch(Event::new(
                resource.clone(),
                Action::SetLoading(Target::client(client_id)),
            ));
            client_id
        });

        if optimistic {
            inner.container.dispatch(Event::new(
                resource.clone(),
                Action::SetOptimisticData {
                    target: Target::new(id.clone(), client_id),
                    data: request.attributes.clone(),
                },
            ));
        }

        let (tx, rx) = oneshot::channel();
        let job = Job {
            resource: resource.clone(),
            verb,
            request: transport_request,
            id,
            client_id,
            id_attribute: rc.id_attribute.clone(),
            kind: rc.kind,
            parse: rc.parse.clone(),
            set_metadata: rc.set_metadata.clone(),
            optimistic,
            reply: tx,
        };
        let queueing_disabled = config.queueing_disabled_for(rc);

        let event = match query {
            Some(query) if inherits_query => event.with_query_params(query),
            _ => event,
        };
        inner.container.dispatch(event);

        if queueing_disabled {
            let inner = Arc::clone(inner);
            handle.spawn(async move { inner.execute(job).await });
        } else if inner.queue.push(&resource, job) {
            LaneDrainer::spawn(Arc::clone(inner), &handle, resource.clone());
        } else {
            tracing::debug!(
                resource = %resource,
                verb = %verb,
                queued = inner.queue.len(&resource),
                "request queued"
            );
        }

        Ok(Dispatch::Pending(PendingFetch {
            resource,
            verb,
            client_id,
            rx,
        }))
    }
}

/// Owns a resource lane while draining it.
///
/// If a job panics, the task's future is dropped while unwinding. The lane
/// is then released and, when jobs are still waiting, a fresh drainer is
/// spawned, so the requests queued behind the panicking one still run.
struct LaneDrainer<C, T>
where
    C: StateContainer + 'static,
    T: Transport + 'static,
{
    inner: Arc<Inner<C, T>>,
    handle: Handle,
    resource: String,
    armed: bool,
}

impl<C, T> LaneDrainer<C, T>
where
    C: StateContainer + 'static,
    T: Transport + 'static,
{
    fn spawn(inner: Arc<Inner<C, T>>, handle: &Handle, resource: String) {
        let drainer = Self {
            inner,
            handle: handle.clone(),
            resource,
            armed: true,
        };
        handle.spawn(drainer.run());
    }

    async fn run(mut self) {
        while let Some(job) = self.inner.queue.next(&self.resource) {
            self.inner.execute(job).await;
        }
        // `next` returned `None`, which already marked the lane idle.
        self.armed = false;
    }
}

impl<C, T> Drop for LaneDrainer<C, T>
where
    C: StateContainer + 'static,
    T: Transport + 'static,
{
    fn drop(&mut self) {
        if !self.armed || !std::thread::panicking() {
            return;
        }
        tracing::warn!(resource = %self.resource, "request task panicked");
        if self.inner.queue.release(&self.resource) {
            let resource = std::mem::take(&mut self.resource);
            Self::spawn(Arc::clone(&self.inner), &self.handle, resource);
        }
    }
}

impl<C, T> Inner<C, T>
where
    C: StateContainer,
    T: Transport,
{
    async fn execute(&self, mut job: Job) {
        tracing::debug!(
            resource = %job.resource,
            verb = %job.verb,
            method = %job.request.method,
            url = %job.request.url,
            "issuing request"
        );

        let method = job.request.method;
        let request = std::mem::replace(&mut job.request, TransportRequest::new(method, ""));
        let result = self.transport.send(request).await;

        let outcome = match interpret(&job, result) {
            Ok(success) => {
                let completed = Completed {
                    resource: job.resource.clone(),
                    verb: job.verb,
                    id: success.id.clone(),
                    client_id: success.client_id,
                    response: success.response.clone(),
                    meta: success.meta.clone(),
                };
                self.container
                    .dispatch(Event::success(job.resource.clone(), job.verb, success));
                Ok(completed)
            }
            Err(failure) => {
                tracing::warn!(
                    resource = %job.resource,
                    verb = %job.verb,
                    error = %failure.error,
                    "request failed"
                );
                let rejected = DispatchError::Rejected {
                    resource: job.resource.clone(),
                    verb: job.verb,
                    id: failure.id.clone(),
                    client_id: failure.client_id,
                    error: failure.error.clone(),
                };
                let target = Target::new(failure.id.clone(), failure.client_id);
                self.container
                    .dispatch(Event::failure(job.resource.clone(), job.verb, failure));
                if job.optimistic {
                    self.container.dispatch(Event::new(
                        job.resource.clone(),
                        Action::UnsetOptimisticData {
                            target,
                            destroy: job.verb == Verb::Create,
                        },
                    ));
                }
                Err(rejected)
            }
        };

        // The caller may have dropped the pending handle.
        let _ = job.reply.send(outcome);
    }
}

/// Encodes the JSON body of a non-GET request.
fn request_body(
    rc: &ResourceConfig,
    request: &Request,
    id: Option<&ResourceId>,
) -> DispatchResult<Option<Vec<u8>>> {
    let mut body = match request.verb {
        Verb::Index | Verb::Show => return Ok(None),
        Verb::Create | Verb::Update => request.attributes.clone(),
        Verb::Destroy => Attributes::new(),
    };
    if request.verb != Verb::Create {
        if let Some(id) = id {
            body.insert(rc.id_attribute.clone(), id.to_value());
        }
    }
    Ok(Some(serde_json::to_vec(&Value::Object(body))?))
}

fn transport_message(error: DispatchError) -> String {
    match error {
        DispatchError::Transport { message } => message,
        other => other.to_string(),
    }
}

fn into_meta(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        Value::Null => Attributes::new(),
        other => {
            tracing::warn!(meta = %other, "metadata hook must return an object; ignored");
            Attributes::new()
        }
    }
}

/// Runs a response hook. A panicking hook fails the request with a parse
/// error instead of taking the request task down.
fn run_hook(
    name: &str,
    hook: Option<&ResponseHook>,
    kind: ResourceKind,
    body: &Value,
) -> Result<Option<Value>, LoadingError> {
    let Some(hook) = hook else {
        return Ok(None);
    };
    panic::catch_unwind(AssertUnwindSafe(|| hook.apply(kind, body))).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown cause".to_string());
        LoadingError::Parse(format!("{name} hook panicked: {message}"))
    })
}

/// Maps a transport result to the terminal event payload.
fn interpret(job: &Job, result: DispatchResult<TransportResponse>) -> Result<Success, Failure> {
    let failure = |error: LoadingError, id: Option<ResourceId>| Failure {
        id,
        client_id: job.client_id,
        error,
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            return Err(failure(
                LoadingError::Transport(transport_message(e)),
                job.id.clone(),
            ))
        }
    };
    let body = match response.json() {
        Ok(body) => body,
        Err(e) => return Err(failure(LoadingError::Parse(e.to_string()), job.id.clone())),
    };

    let id = body
        .get(job.id_attribute.as_str())
        .and_then(ResourceId::from_value)
        .or_else(|| job.id.clone());

    if !response.is_success() {
        let error = match body.get("error") {
            Some(error) if !error.is_null() => LoadingError::Server(error.clone()),
            _ if response.status_text.is_empty() => {
                LoadingError::Status(format!("HTTP {}", response.status))
            }
            _ => LoadingError::Status(response.status_text.clone()),
        };
        return Err(failure(error, id));
    }

    let hooked = run_hook("parse", job.parse.as_ref(), job.kind, &body).and_then(|parsed| {
        let meta = run_hook("set_metadata", job.set_metadata.as_ref(), job.kind, &body)?;
        Ok((parsed, meta))
    });
    let (parsed, meta) = match hooked {
        Ok(hooked) => hooked,
        Err(error) => return Err(failure(error, id)),
    };
    let meta = meta.map(into_meta).unwrap_or_default();

    Ok(Success {
        id,
        client_id: job.client_id,
        response: parsed.unwrap_or(body),
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use serde_json::json;

    fn job(verb: Verb, kind: ResourceKind) -> (Job, oneshot::Receiver<DispatchResult<Completed>>) {
        let (tx, rx) = oneshot::channel();
        let job = Job {
            resource: "Posts".into(),
            verb,
            request: TransportRequest::new(Method::from(verb), "http://api/posts"),
            id: Some(ResourceId::Int(1)),
            client_id: None,
            id_attribute: "id".into(),
            kind,
            parse: None,
            set_metadata: None,
            optimistic: false,
            reply: tx,
        };
        (job, rx)
    }

    #[test]
    fn client_ids_start_at_one() {
        let ids = ClientIdAllocator::new();
        assert_eq!(ids.last(), None);
        assert_eq!(ids.allocate(), ClientId(1));
        assert_eq!(ids.allocate(), ClientId(2));
        assert_eq!(ids.last(), Some(ClientId(2)));
    }

    #[test]
    fn request_bodies() {
        let rc = ResourceConfig::plural("/posts").with_id_attribute("uuid");
        let attrs = json!({"t": "x"}).as_object().cloned().unwrap();
        let id = ResourceId::from("p1");

        let create = Event::create("Posts", attrs.clone());
        let body = request_body(&rc, create.request().unwrap(), None).unwrap().unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"t": "x"}));

        let update = Event::update("Posts", attrs);
        let body = request_body(&rc, update.request().unwrap(), Some(&id)).unwrap().unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({"t": "x", "uuid": "p1"})
        );

        let destroy = Event::destroy("Posts");
        let body = request_body(&rc, destroy.request().unwrap(), Some(&id)).unwrap().unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"uuid": "p1"}));

        let index = Event::index("Posts");
        assert!(request_body(&rc, index.request().unwrap(), None).unwrap().is_none());
    }

    #[test]
    fn interpret_error_precedence() {
        let (job, _rx) = job(Verb::Show, ResourceKind::Plural);

        let err = interpret(&job, Err(DispatchError::transport("refused"))).unwrap_err();
        assert_eq!(err.error, LoadingError::Transport("refused".into()));

        // an unparseable body wins over the status
        let err = interpret(&job, Ok(TransportResponse::new(500, b"oops".to_vec()))).unwrap_err();
        assert!(matches!(err.error, LoadingError::Parse(_)));

        let err = interpret(
            &job,
            Ok(TransportResponse::from_json(422, &json!({"error": {"title": ["blank"]}}))),
        )
        .unwrap_err();
        assert_eq!(err.error, LoadingError::Server(json!({"title": ["blank"]})));

        let err = interpret(&job, Ok(TransportResponse::from_json(404, &json!({})))).unwrap_err();
        assert_eq!(err.error, LoadingError::Status("Not Found".into()));

        let err = interpret(&job, Ok(TransportResponse::from_json(599, &json!({})))).unwrap_err();
        assert_eq!(err.error, LoadingError::Status("HTTP 599".into()));
    }

    #[test]
    fn interpret_takes_id_from_response() {
        let (job, _rx) = job(Verb::Show, ResourceKind::Plural);
        let success =
            interpret(&job, Ok(TransportResponse::from_json(200, &json!({"id": 9})))).unwrap();
        assert_eq!(success.id, Some(ResourceId::Int(9)));

        let success = interpret(&job, Ok(TransportResponse::from_json(200, &json!({})))).unwrap();
        assert_eq!(success.id, Some(ResourceId::Int(1)));
    }

    #[test]
    fn interpret_applies_hooks_by_kind() {
        let (mut job, _rx) = job(Verb::Index, ResourceKind::Plural);
        job.parse = Some(ResponseHook::collection(|body| body["items"].clone()));
        job.set_metadata = Some(ResponseHook::uniform(|body| json!({"total": body["total"]})));

        let body = json!({"items": [{"id": 1}], "total": 1});
        let success = interpret(&job, Ok(TransportResponse::from_json(200, &body))).unwrap();
        assert_eq!(success.response, json!([{"id": 1}]));
        assert_eq!(success.meta["total"], json!(1));

        job.kind = ResourceKind::Singular;
        let success = interpret(&job, Ok(TransportResponse::from_json(200, &body))).unwrap();
        assert_eq!(success.response, body);
    }

    #[test]
    fn interpret_turns_hook_panics_into_parse_errors() {
        let (mut job, _rx) = job(Verb::Show, ResourceKind::Plural);
        job.set_metadata = Some(ResponseHook::uniform(|_| panic!("no total")));

        let err = interpret(&job, Ok(TransportResponse::from_json(200, &json!({"id": 4}))))
            .unwrap_err();
        assert_eq!(
            err.error,
            LoadingError::Parse("set_metadata hook panicked: no total".into())
        );
        assert_eq!(err.id, Some(ResourceId::Int(4)));
    }
}
