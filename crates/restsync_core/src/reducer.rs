//! Entity reconciliation.
//!
//! [`reduce`] is a pure function from a resource state and an event to the
//! next resource state. [`Reconciler`] routes events across a whole
//! [`StoreState`] by resource name.
//!
//! Slots are located by server ID first, then by client ID. Operations that
//! address a record that does not exist yet create it at the end of the
//! collection; only a destroy success or a withdrawn optimistic create
//! removes one.

use crate::config::{Config, ResourceConfig};
use crate::error::LoadingError;
use crate::event::{Action, Event, Failure, Request, Success, Target, Verb};
use crate::state::{Collection, EntitySlot, ResourceState, StoreState};
use crate::types::{Attributes, ClientId, QueryParams, ResourceId};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Applies events to a whole store state.
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: Arc<Config>,
}

impl Reconciler {
    /// Creates a reconciler for the resources in `config`.
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        Self {
            config: config.into(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Builds the initial state from the seed data.
    #[must_use]
    pub fn initial_state(&self) -> StoreState {
        StoreState::initial(&self.config)
    }

    /// Returns the state after `event`.
    ///
    /// Events for resources that are not configured leave the state
    /// unchanged.
    #[must_use]
    pub fn reduce(&self, state: &StoreState, event: &Event) -> StoreState {
        let (Some(rc), Some(current)) = (
            self.config.resources.get(&event.resource),
            state.get(&event.resource),
        ) else {
            return state.clone();
        };
        let next = reduce(&event.resource, rc, current, event);
        state.with_resource(event.resource.clone(), next)
    }
}

/// Returns the next state of one resource.
#[must_use]
pub fn reduce(
    name: &str,
    resource: &ResourceConfig,
    state: &ResourceState,
    event: &Event,
) -> ResourceState {
    match state {
        ResourceState::Plural(collection) => reduce_collection(name, resource, collection, event)
            .map(ResourceState::Plural)
            .unwrap_or_else(|| fallback(resource, state, event)),
        ResourceState::Singular(slot) => reduce_singleton(slot.as_ref(), event)
            .map(ResourceState::Singular)
            .unwrap_or_else(|| fallback(resource, state, event)),
    }
}

fn fallback(resource: &ResourceConfig, state: &ResourceState, event: &Event) -> ResourceState {
    match &resource.reducer {
        Some(reducer) => reducer.reduce(state, event),
        None => state.clone(),
    }
}

#[derive(Clone, Copy)]
enum Commit {
    Replace,
    Merge,
}

fn commit_for(verb: Verb) -> Commit {
    match verb {
        Verb::Update => Commit::Merge,
        _ => Commit::Replace,
    }
}

fn start(slot: &mut EntitySlot, query_params: Option<&QueryParams>, keep_previous: bool) {
    slot.loading = true;
    slot.loading_error = None;
    if let Some(query_params) = query_params {
        slot.query_params = Some(query_params.clone());
    }
    if !keep_previous {
        slot.previous_attributes = None;
    }
}

fn fail(slot: &mut EntitySlot, error: &LoadingError) {
    slot.loading = false;
    slot.loading_error = Some(error.clone());
}

fn commit(slot: &mut EntitySlot, success: &Success, mode: Commit) {
    let data = match &success.response {
        Value::Object(map) => map.clone(),
        Value::Null => Attributes::new(),
        _ => return fail(slot, &LoadingError::member_format()),
    };
    match mode {
        Commit::Replace => slot.attributes = data,
        Commit::Merge => slot.attributes.extend(data),
    }
    if let Some(id) = &success.id {
        slot.id = Some(id.clone());
    }
    if slot.client_id.is_none() {
        slot.client_id = success.client_id;
    }
    slot.loading = false;
    slot.loading_error = None;
    slot.previous_attributes = None;
    slot.meta = success.meta.clone();
}

fn apply_optimistic(slot: &mut EntitySlot, data: &Attributes) {
    slot.previous_attributes = Some(slot.attributes.clone());
    slot.attributes.extend(data.clone());
}

fn rollback(slot: &mut EntitySlot) {
    if let Some(previous) = slot.previous_attributes.take() {
        slot.attributes = previous;
    }
    slot.loading = false;
}

/// Applies `f` to the slot addressed by `id`/`client_id`, appending a new
/// slot when none matches. Missing identifiers are filled in on a match.
fn upsert(
    collection: &mut Collection,
    id: Option<&ResourceId>,
    client_id: Option<ClientId>,
    f: impl FnOnce(&mut EntitySlot),
) {
    match collection.position(id, client_id) {
        Some(index) => {
            let slot = Arc::make_mut(&mut collection.models[index]);
            if slot.id.is_none() {
                slot.id = id.cloned();
            }
            if slot.client_id.is_none() {
                slot.client_id = client_id;
            }
            f(slot);
        }
        None => {
            let mut slot = EntitySlot::new(id.cloned(), client_id);
            f(&mut slot);
            collection.models.push(Arc::new(slot));
        }
    }
}

fn remove(collection: &mut Collection, id: Option<&ResourceId>, client_id: Option<ClientId>) {
    if let Some(index) = collection.position(id, client_id) {
        collection.models.remove(index);
    }
}

fn list_items<'a>(name: &str, response: &'a Value) -> Option<&'a Vec<Value>> {
    match response {
        Value::Array(items) => Some(items),
        Value::Object(map) => map
            .get(name)
            .or_else(|| map.get(&name.to_lowercase()))
            .and_then(Value::as_array),
        _ => None,
    }
}

fn list_success(name: &str, resource: &ResourceConfig, collection: &mut Collection, success: &Success) {
    let records: Option<Vec<EntitySlot>> = list_items(name, &success.response).and_then(|items| {
        items
            .iter()
            .map(|item| {
                item.as_object()
                    .map(|record| EntitySlot::from_record(record.clone(), &resource.id_attribute))
            })
            .collect()
    });

    collection.loading = false;
    let Some(records) = records else {
        tracing::warn!(
            resource = name,
            "INDEX response must be an array or hold one under the resource name"
        );
        collection.loading_error = Some(LoadingError::list_format());
        return;
    };

    let page: Vec<Arc<EntitySlot>> = records.into_iter().map(Arc::new).collect();
    collection.models = if resource.paginated {
        let page_ids: HashSet<&ResourceId> = page.iter().filter_map(|m| m.id.as_ref()).collect();
        collection
            .models
            .iter()
            .filter(|m| m.id.as_ref().map_or(true, |id| !page_ids.contains(id)))
            .cloned()
            .chain(page.iter().cloned())
            .collect()
    } else {
        page
    };
    collection.loading_error = None;
    collection.meta.extend(success.meta.clone());
}

fn item_failure(collection: &mut Collection, failure: &Failure) {
    let id = failure.id.as_ref();
    if collection.position(id, failure.client_id).is_none() && id.is_none() {
        return;
    }
    upsert(collection, id, failure.client_id, |slot| fail(slot, &failure.error));
}

fn request_start(resource: &ResourceConfig, collection: &mut Collection, request: &Request) {
    let keep_previous = match request.verb {
        Verb::Index => {
            collection.loading = true;
            collection.loading_error = None;
            collection.query_params = request.query_params.clone();
            if !resource.paginated {
                collection.models.clear();
            }
            return;
        }
        Verb::Create => return,
        Verb::Show => false,
        Verb::Update | Verb::Destroy => true,
    };
    let Some(id) = request.target_id(&resource.id_attribute) else {
        return;
    };
    let query_params = if request.verb == Verb::Show {
        request.query_params.as_ref()
    } else {
        None
    };
    upsert(collection, Some(&id), None, |slot| {
        start(slot, query_params, keep_previous)
    });
}

/// Returns `None` when the event is not handled here.
fn reduce_collection(
    name: &str,
    resource: &ResourceConfig,
    collection: &Collection,
    event: &Event,
) -> Option<Collection> {
    let mut next = collection.clone();
    match &event.action {
        Action::Request(request) => request_start(resource, &mut next, request),
        Action::Success { verb, success } => match verb {
            Verb::Index => list_success(name, resource, &mut next, success),
            Verb::Destroy => remove(&mut next, success.id.as_ref(), success.client_id),
            Verb::Show | Verb::Create | Verb::Update => {
                let mode = commit_for(*verb);
                upsert(&mut next, success.id.as_ref(), success.client_id, |slot| {
                    commit(slot, success, mode)
                });
            }
        },
        Action::Failure { verb, failure } => match verb {
            Verb::Index => {
                next.loading = false;
                next.loading_error = Some(failure.error.clone());
            }
            _ => item_failure(&mut next, failure),
        },
        Action::AssignClientId { client_id } => {
            if next.by_client_id(*client_id).is_none() {
                next.models
                    .push(Arc::new(EntitySlot::new(None, Some(*client_id))));
            }
        }
        Action::SetLoading(Target { id, client_id }) => {
            if id.is_some() || client_id.is_some() {
                upsert(&mut next, id.as_ref(), *client_id, |slot| start(slot, None, true));
            }
        }
        Action::SetOptimisticData {
            target: Target { id, client_id },
            data,
        } => {
            if id.is_some() || client_id.is_some() {
                upsert(&mut next, id.as_ref(), *client_id, |slot| apply_optimistic(slot, data));
            }
        }
        Action::UnsetOptimisticData {
            target: Target { id, client_id },
            destroy,
        } => {
            if *destroy {
                match client_id {
                    Some(cid) => remove(&mut next, None, Some(*cid)),
                    None => remove(&mut next, id.as_ref(), None),
                }
            } else if let Some(index) = next.position(id.as_ref(), *client_id) {
                rollback(Arc::make_mut(&mut next.models[index]));
            }
        }
        Action::Custom { .. } => return None,
    }
    Some(next)
}

/// Returns `None` when the event is not handled here.
///
/// A destroyed singleton only comes back through a SHOW, a SHOW or CREATE
/// success, or the bookkeeping of a create (events addressed by client ID).
/// Every other event leaves it destroyed.
fn reduce_singleton(slot: Option<&EntitySlot>, event: &Event) -> Option<Option<EntitySlot>> {
    let current = || slot.cloned().unwrap_or_default();
    let revives = |target: &Target| slot.is_some() || target.client_id.is_some();
    let next = match &event.action {
        Action::Request(request) => match request.verb {
            Verb::Index => return None,
            Verb::Create => slot.cloned(),
            Verb::Show => {
                let mut next = current();
                start(&mut next, request.query_params.as_ref(), false);
                Some(next)
            }
            Verb::Update | Verb::Destroy => slot.cloned().map(|mut next| {
                start(&mut next, None, true);
                next
            }),
        },
        Action::Success { verb, success } => match verb {
            Verb::Index => return None,
            Verb::Destroy => None,
            Verb::Show | Verb::Create => {
                let mut next = current();
                commit(&mut next, success, Commit::Replace);
                Some(next)
            }
            Verb::Update => slot.cloned().map(|mut next| {
                commit(&mut next, success, Commit::Merge);
                next
            }),
        },
        Action::Failure { verb, failure } => match verb {
            Verb::Index => return None,
            _ => slot.cloned().map(|mut next| {
                fail(&mut next, &failure.error);
                next
            }),
        },
        Action::AssignClientId { client_id } => {
            let mut next = current();
            next.client_id = Some(*client_id);
            Some(next)
        }
        Action::SetLoading(target) => revives(target).then(|| {
            let mut next = current();
            start(&mut next, None, true);
            next
        }),
        Action::SetOptimisticData { target, data } => revives(target).then(|| {
            let mut next = current();
            apply_optimistic(&mut next, data);
            next
        }),
        Action::UnsetOptimisticData { destroy: true, .. } => None,
        Action::UnsetOptimisticData { destroy: false, .. } => slot.cloned().map(|mut next| {
            rollback(&mut next);
            next
        }),
        Action::Custom { .. } => return None,
    };
    Some(next)
}
