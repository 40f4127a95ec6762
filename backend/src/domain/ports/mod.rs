//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports describe what the domain needs from storage and the identity
//! provider; driving ports describe the use-cases inbound adapters call.

mod macros;
pub(crate) use macros::define_port_error;

mod reference_directory;
mod speaker_request_command;
mod speaker_request_query;
mod speaker_request_repository;

#[cfg(test)]
pub use reference_directory::MockReferenceDirectory;
pub use reference_directory::{
    ReferenceDirectory, ReferenceDirectoryError, TrustedReferenceDirectory,
};
#[cfg(test)]
pub use speaker_request_command::MockSpeakerRequestCommand;
pub use speaker_request_command::{
    AcceptSpeakerRequest, CreateSpeakerRequest, EditSpeakerRequestMessage, RejectSpeakerRequest,
    SpeakerRequestCommand, SpeakerRequestPayload,
};
#[cfg(test)]
pub use speaker_request_query::MockSpeakerRequestQuery;
pub use speaker_request_query::SpeakerRequestQuery;
#[cfg(test)]
pub use speaker_request_repository::MockSpeakerRequestRepository;
pub use speaker_request_repository::{
    SpeakerRequestRepository, SpeakerRequestRepositoryError, TransitionOutcome,
};
