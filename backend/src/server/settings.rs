//! Service settings loaded via OrthoConfig.
//!
//! Values come from CLI flags, `SPEAKER_REQUESTS_*` environment variables,
//! and an optional configuration file. Unset values fall back to defaults;
//! invalid values fail startup with a [`SettingsError`].

use std::net::SocketAddr;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{
    AcceptancePolicy, AcceptanceRules, DEFAULT_SIBLING_REJECTION_REASON,
    ParseAcceptancePolicyError, ScoringError, ScoringWeights, TextValidationError,
};
use crate::outbound::persistence::PoolConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Errors raised when settings hold unusable values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    /// The bind address is not `host:port`.
    #[error("bind_addr {value:?} is not a socket address")]
    InvalidBindAddr { value: String },
    /// The acceptance policy is unknown.
    #[error(transparent)]
    InvalidAcceptancePolicy(#[from] ParseAcceptancePolicyError),
    /// The sibling rejection reason is blank or too long.
    #[error("sibling_rejection_reason: {0}")]
    InvalidSiblingReason(#[from] TextValidationError),
    /// The scorer weights are negative, non-finite, or all zero.
    #[error("scoring weights: {0}")]
    InvalidWeights(#[from] ScoringError),
}

/// Runtime settings for the speaker request service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "SPEAKER_REQUESTS")]
pub struct ServiceSettings {
    /// Listen address, `host:port`.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL; without one the in-memory store is used.
    pub database_url: Option<String>,
    /// Upper bound on pooled database connections.
    pub pool_max_size: Option<u32>,
    /// Apply embedded migrations before serving.
    #[ortho_config(default = false)]
    pub run_migrations: bool,
    /// `non_exclusive` (default) or `exclusive`.
    pub acceptance_policy: Option<String>,
    /// Reason recorded on siblings rejected by an exclusive acceptance.
    pub sibling_rejection_reason: Option<String>,
    /// Weight of topic overlap.
    pub topic_weight: Option<f64>,
    /// Weight of expertise coverage.
    pub expertise_weight: Option<f64>,
    /// Weight of availability fit.
    pub availability_weight: Option<f64>,
    /// Weight of past ratings.
    pub rating_weight: Option<f64>,
}

impl ServiceSettings {
    /// Parsed listen address.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|_| SettingsError::InvalidBindAddr {
            value: raw.to_owned(),
        })
    }

    /// Pool configuration when a database URL is set.
    pub fn pool_config(&self) -> Option<PoolConfig> {
        self.database_url.as_deref().map(|url| {
            let config = PoolConfig::new(url);
            match self.pool_max_size {
                Some(max_size) => config.with_max_size(max_size),
                None => config,
            }
        })
    }

    /// Acceptance policy and sibling reason.
    pub fn acceptance_rules(&self) -> Result<AcceptanceRules, SettingsError> {
        let policy = match self.acceptance_policy.as_deref() {
            Some(raw) => raw.parse()?,
            None => AcceptancePolicy::default(),
        };
        let reason = self
            .sibling_rejection_reason
            .as_deref()
            .unwrap_or(DEFAULT_SIBLING_REJECTION_REASON);
        Ok(AcceptanceRules::new(policy, reason)?)
    }

    /// Scorer weights; unset weights keep their default.
    pub fn scoring_weights(&self) -> Result<ScoringWeights, SettingsError> {
        let defaults = ScoringWeights::default();
        Ok(ScoringWeights::new(
            self.topic_weight.unwrap_or(defaults.topics()),
            self.expertise_weight.unwrap_or(defaults.expertise()),
            self.availability_weight.unwrap_or(defaults.availability()),
            self.rating_weight.unwrap_or(defaults.rating()),
        )?)
    }
}
