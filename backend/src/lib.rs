//! Speaker request matching and ranking service.
//!
//! Organizers propose speakers for events; each proposal is scored once at
//! creation, ranked among the event's pending proposals, and moved to a
//! terminal state by acceptance or rejection.

pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use middleware::Trace;
