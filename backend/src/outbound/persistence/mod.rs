//! PostgreSQL persistence adapter using Diesel ORM.
//!
//! The repository is a thin translation layer: Diesel rows (`models.rs`) and
//! table definitions (`schema.rs`) stay internal, and every row is rebuilt
//! through the validating domain constructors. Connections come from a `bb8`
//! pool driven by `diesel-async`.
//!
//! # Example
//!
//! ```ignore
//! use speaker_requests::outbound::persistence::{
//!     DbPool, DieselSpeakerRequestRepository, PoolConfig,
//! };
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/speakers")).await?;
//! let repository = DieselSpeakerRequestRepository::new(pool);
//! ```

mod diesel_speaker_request_repository;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_speaker_request_repository::DieselSpeakerRequestRepository;
pub use migrations::{
    MIGRATIONS, MigrationError, apply_pending_migrations, run_pending_migrations,
};
pub use pool::{DbPool, PoolConfig, PoolError};
