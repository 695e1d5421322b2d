//! # restsync Dispatch
//!
//! Request dispatcher for restsync.
//!
//! This crate provides:
//! - The `Dispatcher`, which turns request intents into HTTP calls
//! - Per-resource FIFO queueing of requests
//! - Client ID allocation and optimistic update bookkeeping
//! - URL and query string construction
//! - A transport abstraction with `reqwest` and mock implementations
//!
//! ## Request lifecycle
//!
//! 1. Bookkeeping events: a client ID and loading marker for creates, then
//!    the intended attributes when optimistic updates are enabled
//! 2. The intent itself is forwarded as the start event
//! 3. The request waits for earlier requests of the same resource
//! 4. The response becomes a success or failure event; a failed optimistic
//!    write is withdrawn
//!
//! ## Key Invariants
//!
//! - Requests of one resource complete in the order they were dispatched
//! - The next queued request starts only after the previous one's terminal
//!   events were emitted
//! - Every issued request ends in exactly one success or failure event

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dispatcher;
mod error;
mod http;
mod queue;
mod transport;
mod url;

pub use dispatcher::{ClientIdAllocator, Completed, Dispatch, Dispatcher, PendingFetch};
pub use error::{DispatchError, DispatchResult};
pub use http::HttpTransport;
pub use queue::FetchQueue;
pub use transport::{
    status_text, Method, MockReply, MockTransport, Transport, TransportRequest, TransportResponse,
};
pub use url::{build_url, query_string, UrlParts};
