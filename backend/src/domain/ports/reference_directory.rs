//! Driven port resolving externally owned speakers, events, and organizers.

use async_trait::async_trait;

use crate::domain::{EventId, OrganizerId, SpeakerId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by reference directory adapters.
    pub enum ReferenceDirectoryError {
        /// The identity provider could not be reached.
        Unavailable { message: String } =>
            "reference directory unavailable: {message}",
    }
}

/// Existence checks against the identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferenceDirectory: Send + Sync {
    /// Whether the speaker exists.
    async fn speaker_exists(&self, id: &SpeakerId) -> Result<bool, ReferenceDirectoryError>;

    /// Whether the event exists.
    async fn event_exists(&self, id: &EventId) -> Result<bool, ReferenceDirectoryError>;

    /// Whether the organizer exists.
    async fn organizer_exists(&self, id: &OrganizerId) -> Result<bool, ReferenceDirectoryError>;
}

/// Directory for deployments that validate references upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustedReferenceDirectory;

#[async_trait]
impl ReferenceDirectory for TrustedReferenceDirectory {
    async fn speaker_exists(&self, _id: &SpeakerId) -> Result<bool, ReferenceDirectoryError> {
        Ok(true)
    }

    async fn event_exists(&self, _id: &EventId) -> Result<bool, ReferenceDirectoryError> {
        Ok(true)
    }

    async fn organizer_exists(&self, _id: &OrganizerId) -> Result<bool, ReferenceDirectoryError> {
        Ok(true)
    }
}
