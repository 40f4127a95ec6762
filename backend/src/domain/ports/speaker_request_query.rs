//! Driving port for speaker request reads.

use async_trait::async_trait;

use super::SpeakerRequestPayload;
use crate::domain::{Error, EventId, RequestId};

/// Use-case port for reading speaker requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeakerRequestQuery: Send + Sync {
    /// Fetch one request by id.
    async fn get(&self, request_id: RequestId) -> Result<SpeakerRequestPayload, Error>;

    /// Pending requests of an event, rank ascending.
    async fn list_ranked_pending(
        &self,
        event_id: EventId,
    ) -> Result<Vec<SpeakerRequestPayload>, Error>;
}
