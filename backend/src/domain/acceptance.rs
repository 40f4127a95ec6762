//! Policy deciding how an acceptance affects sibling requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{RejectionReason, SiblingEffect, TextValidationError, Transition, TransitionPlan};

/// Reason recorded on siblings rejected by an exclusive acceptance.
pub const DEFAULT_SIBLING_REJECTION_REASON: &str = "another speaker was accepted for this event";

/// Whether an event may accept more than one speaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptancePolicy {
    /// Accepting a request leaves siblings pending.
    #[default]
    NonExclusive,
    /// Accepting a request rejects every other pending sibling.
    Exclusive,
}

impl AcceptancePolicy {
    /// Configuration spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NonExclusive => "non_exclusive",
            Self::Exclusive => "exclusive",
        }
    }
}

impl fmt::Display for AcceptancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown acceptance policy `{input}`; expected non_exclusive or exclusive")]
pub struct ParseAcceptancePolicyError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for AcceptancePolicy {
    type Err = ParseAcceptancePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "non_exclusive" => Ok(Self::NonExclusive),
            "exclusive" => Ok(Self::Exclusive),
            _ => Err(ParseAcceptancePolicyError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Builds transition plans according to an [`AcceptancePolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceRules {
    policy: AcceptancePolicy,
    sibling_reason: RejectionReason,
}

impl AcceptanceRules {
    /// Rules for `policy`, rejecting siblings with `sibling_reason` when exclusive.
    pub fn new(
        policy: AcceptancePolicy,
        sibling_reason: impl AsRef<str>,
    ) -> Result<Self, TextValidationError> {
        Ok(Self {
            policy,
            sibling_reason: RejectionReason::new(sibling_reason)?,
        })
    }

    /// Active policy.
    pub const fn policy(&self) -> AcceptancePolicy {
        self.policy
    }

    /// Plan for accepting a request.
    pub fn accept_plan(&self) -> TransitionPlan {
        let siblings = match self.policy {
            AcceptancePolicy::NonExclusive => SiblingEffect::Keep,
            AcceptancePolicy::Exclusive => {
                SiblingEffect::RejectPending(self.sibling_reason.clone())
            }
        };
        TransitionPlan {
            transition: Transition::Accept,
            siblings,
        }
    }

    /// Plan for rejecting a request. Rejection never affects siblings.
    pub fn reject_plan(&self, reason: RejectionReason) -> TransitionPlan {
        TransitionPlan::isolated(Transition::Reject(reason))
    }
}

impl Default for AcceptanceRules {
    fn default() -> Self {
        Self {
            policy: AcceptancePolicy::NonExclusive,
            sibling_reason: RejectionReason(DEFAULT_SIBLING_REJECTION_REASON.to_owned()),
        }
    }
}
