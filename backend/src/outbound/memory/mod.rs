//! In-process adapters used when no database is configured and in tests.

mod in_memory_reference_directory;
mod in_memory_speaker_request_repository;

pub use in_memory_reference_directory::InMemoryReferenceDirectory;
pub use in_memory_speaker_request_repository::InMemorySpeakerRequestRepository;
