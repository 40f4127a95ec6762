//! Opaque identifiers for speaker requests and the entities they reference.
//!
//! Speakers, events, and organizers are owned by external systems; this crate
//! only stores their identifiers. All identifiers are UUIDs serialised as
//! hyphenated strings.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Validation errors returned when parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdValidationError {
    /// Input was empty.
    #[error("{kind} must not be empty")]
    Empty {
        /// Identifier kind, e.g. `speaker id`.
        kind: &'static str,
    },
    /// Input was not a UUID or carried surrounding whitespace.
    #[error("{kind} must be a valid UUID")]
    Invalid {
        /// Identifier kind, e.g. `speaker id`.
        kind: &'static str,
    },
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident => $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Uuid);

        impl $name {
            /// Validate and construct the identifier from a string.
            pub fn new(id: impl AsRef<str>) -> Result<Self, IdValidationError> {
                let raw = id.as_ref();
                if raw.is_empty() {
                    return Err(IdValidationError::Empty { kind: $kind });
                }
                if raw.trim() != raw {
                    return Err(IdValidationError::Invalid { kind: $kind });
                }
                Uuid::parse_str(raw)
                    .map(Self)
                    .map_err(|_| IdValidationError::Invalid { kind: $kind })
            }

            /// Generate a new random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Access the underlying UUID.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = IdValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.to_string()
            }
        }
    };
}

define_id! {
    /// Identifier of a speaker request.
    RequestId => "request id"
}

define_id! {
    /// Identifier of an externally owned speaker.
    SpeakerId => "speaker id"
}

define_id! {
    /// Identifier of an externally owned event.
    EventId => "event id"
}

define_id! {
    /// Identifier of the organizer (user) who initiated a request.
    OrganizerId => "organizer id"
}
