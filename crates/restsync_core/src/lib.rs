//! # restsync Core
//!
//! Entity reconciliation engine for restsync.
//!
//! This crate provides:
//! - Resource configuration, including fragment merging
//! - The event vocabulary (request intents, outcomes, optimistic bookkeeping)
//! - A pure reducer over collection and single-record state
//! - An in-memory `Store` with a change feed
//!
//! ## Architecture
//!
//! State lives in an immutable [`StoreState`]: one shared value per resource.
//! Every transition is an [`Event`] applied by [`reduce`], which builds a new
//! value and leaves the previous snapshot untouched. The core never performs
//! I/O; requests are issued by `restsync_dispatch`, which reports progress
//! back as events.
//!
//! ## Key Invariants
//!
//! - At most one slot per server ID and one per client ID in a collection
//! - Lookup by server ID takes precedence over client ID
//! - Starting a request clears the error; every terminal event clears loading
//! - Collections shrink only on destroy or a withdrawn optimistic create

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod event;
mod feed;
mod reducer;
mod state;
mod store;
mod types;

pub use config::{
    Config, ConfigFragment, ConfigSource, CustomReducer, FetchParams, HookFn, ResourceConfig,
    ResourceGroup, ResourceKind, ResponseHook,
};
pub use error::{CoreError, CoreResult, LoadingError, LIST_FORMAT_MESSAGE, MEMBER_FORMAT_MESSAGE};
pub use event::{Action, Event, Failure, Request, Success, Target, Verb};
pub use feed::{StateChange, StateFeed};
pub use reducer::{reduce, Reconciler};
pub use state::{Collection, EntitySlot, ResourceState, StoreState};
pub use store::{StateContainer, Store};
pub use types::{Attributes, ClientId, QueryParams, ResourceId};
