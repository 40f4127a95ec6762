//! HTTP server configuration object.

use std::net::SocketAddr;

use crate::domain::{AcceptanceRules, ScoringWeights};
use crate::outbound::persistence::DbPool;

use super::settings::{ServiceSettings, SettingsError};

/// Resolved configuration for [`super::create_server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) acceptance_rules: AcceptanceRules,
    pub(crate) scoring_weights: ScoringWeights,
}

impl ServerConfig {
    /// In-memory configuration with default policy and weights.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            db_pool: None,
            acceptance_rules: AcceptanceRules::default(),
            scoring_weights: ScoringWeights::default(),
        }
    }

    /// Validate settings into a configuration. The pool is attached
    /// separately because building it needs the runtime.
    pub fn from_settings(settings: &ServiceSettings) -> Result<Self, SettingsError> {
        Ok(Self::new(settings.bind_addr()?)
            .with_acceptance_rules(settings.acceptance_rules()?)
            .with_scoring_weights(settings.scoring_weights()?))
    }

    /// Store requests in PostgreSQL instead of memory.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Override the acceptance rules.
    #[must_use]
    pub fn with_acceptance_rules(mut self, rules: AcceptanceRules) -> Self {
        self.acceptance_rules = rules;
        self
    }

    /// Override the scorer weights.
    #[must_use]
    pub fn with_scoring_weights(mut self, weights: ScoringWeights) -> Self {
        self.scoring_weights = weights;
        self
    }

    /// Socket address the server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Whether requests are persisted in PostgreSQL.
    #[must_use]
    pub fn uses_database(&self) -> bool {
        self.db_pool.is_some()
    }
}
