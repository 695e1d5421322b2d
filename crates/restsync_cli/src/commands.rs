//! CLI command implementations.

use restsync_core::{Attributes, Config, Event, QueryParams, ResourceId, StateContainer, Store};
use restsync_dispatch::{Dispatch, DispatchError, Dispatcher, Transport};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Result type of CLI commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Result of a single intent.
#[derive(Debug)]
pub struct Outcome {
    /// Reconciled state of the resource after the request settled.
    pub state: Value,
    /// Set when the request ended in a failure event.
    pub rejected: Option<DispatchError>,
}

/// Reads and validates a configuration file.
pub fn load_config(path: &Path) -> CliResult<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    Ok(Config::from_json(&text)?)
}

/// Returns the initial state of every configured resource.
pub fn check(config: Config) -> CliResult<Value> {
    let store = Store::new(config)?;
    Ok(serde_json::to_value(&*store.snapshot())?)
}

/// Parses a record ID, preferring integers.
pub fn parse_id(raw: &str) -> ResourceId {
    raw.parse::<i64>()
        .map(ResourceId::Int)
        .unwrap_or_else(|_| ResourceId::Str(raw.to_string()))
}

/// Sets the ID of an intent when one was given.
pub fn with_optional_id(event: Event, id: Option<String>) -> Event {
    match id {
        Some(id) => event.with_id(parse_id(&id)),
        None => event,
    }
}

/// Parses `key=value` pairs. A repeated key collects its values into an
/// array.
pub fn parse_query(pairs: &[String]) -> CliResult<QueryParams> {
    let mut query = QueryParams::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Query parameter must be key=value: {pair}"))?;
        let value = Value::String(value.to_string());
        match query.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                query.insert(key.to_string(), value);
            }
        }
    }
    Ok(query)
}

/// Parses record attributes given as a JSON object.
pub fn parse_data(raw: &str) -> CliResult<Attributes> {
    match serde_json::from_str(raw)? {
        Value::Object(attributes) => Ok(attributes),
        _ => Err("Data must be a JSON object".into()),
    }
}

/// Dispatches one intent and waits for it to settle.
///
/// A rejected request is not an error here: its failure is already part of
/// the returned state.
pub async fn run<T>(config: Config, event: Event, transport: T) -> CliResult<Outcome>
where
    T: Transport + 'static,
{
    let resource = event.resource.clone();
    config.resource(&resource)?;

    let store = Arc::new(Store::new(config.clone())?);
    let dispatcher = Dispatcher::new(config, Arc::clone(&store), transport);

    let rejected = match dispatcher.dispatch(event)? {
        Dispatch::Pending(pending) => match pending.outcome().await {
            Ok(completed) => {
                tracing::info!(
                    resource = %completed.resource,
                    verb = %completed.verb,
                    "request completed"
                );
                None
            }
            Err(error @ DispatchError::Rejected { .. }) => Some(error),
            Err(error) => return Err(error.into()),
        },
        Dispatch::Forwarded => None,
    };

    let snapshot = store.snapshot();
    let state = match snapshot.get(&resource) {
        Some(state) => serde_json::to_value(state)?,
        None => Value::Null,
    };
    Ok(Outcome { state, rejected })
}
