//! HTTP inbound adapter exposing the organizer-facing REST endpoints.

pub mod error;
pub mod health;
pub mod speaker_requests;
pub mod state;
pub mod validation;

pub use error::ApiResult;
