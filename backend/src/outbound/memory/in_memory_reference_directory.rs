//! Reference directory backed by in-process sets of known ids.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::ports::{ReferenceDirectory, ReferenceDirectoryError};
use crate::domain::{EventId, OrganizerId, SpeakerId};

/// Directory answering existence checks from registered ids.
#[derive(Debug, Default)]
pub struct InMemoryReferenceDirectory {
    speakers: RwLock<HashSet<SpeakerId>>,
    events: RwLock<HashSet<EventId>>,
    organizers: RwLock<HashSet<OrganizerId>>,
}

fn contains<T: Eq + std::hash::Hash>(
    set: &RwLock<HashSet<T>>,
    id: &T,
) -> Result<bool, ReferenceDirectoryError> {
    set.read()
        .map(|ids| ids.contains(id))
        .map_err(|_| ReferenceDirectoryError::unavailable("directory lock poisoned"))
}

fn insert<T: Eq + std::hash::Hash>(set: &RwLock<HashSet<T>>, id: T) {
    match set.write() {
        Ok(mut ids) => {
            ids.insert(id);
        }
        Err(poisoned) => {
            poisoned.into_inner().insert(id);
        }
    }
}

impl InMemoryReferenceDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a speaker.
    pub fn add_speaker(&self, id: SpeakerId) {
        insert(&self.speakers, id);
    }

    /// Register an event.
    pub fn add_event(&self, id: EventId) {
        insert(&self.events, id);
    }

    /// Register an organizer.
    pub fn add_organizer(&self, id: OrganizerId) {
        insert(&self.organizers, id);
    }
}

#[async_trait]
impl ReferenceDirectory for InMemoryReferenceDirectory {
    async fn speaker_exists(&self, id: &SpeakerId) -> Result<bool, ReferenceDirectoryError> {
        contains(&self.speakers, id)
    }

    async fn event_exists(&self, id: &EventId) -> Result<bool, ReferenceDirectoryError> {
        contains(&self.events, id)
    }

    async fn organizer_exists(&self, id: &OrganizerId) -> Result<bool, ReferenceDirectoryError> {
        contains(&self.organizers, id)
    }
}
