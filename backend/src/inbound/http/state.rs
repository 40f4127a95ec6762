//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and depend only on the driving
//! ports, so they can be tested against mocks without any storage.

use std::sync::Arc;

use crate::domain::ports::{SpeakerRequestCommand, SpeakerRequestQuery};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub speaker_requests: Arc<dyn SpeakerRequestCommand>,
    pub speaker_requests_query: Arc<dyn SpeakerRequestQuery>,
}

impl HttpState {
    /// Bundle the command and query ports.
    pub fn new(
        speaker_requests: Arc<dyn SpeakerRequestCommand>,
        speaker_requests_query: Arc<dyn SpeakerRequestQuery>,
    ) -> Self {
        Self {
            speaker_requests,
            speaker_requests_query,
        }
    }

    /// Use one service for both ports.
    pub fn from_service<S>(service: Arc<S>) -> Self
    where
        S: SpeakerRequestCommand + SpeakerRequestQuery + 'static,
    {
        Self::new(service.clone(), service)
    }
}
