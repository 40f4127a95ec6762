//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **memory**: in-process store partitioned per event
//! - **persistence**: PostgreSQL-backed store using Diesel ORM
//!
//! Adapters translate between domain types and storage representations and
//! own the per-event critical section around "mutate pending set, re-rank".

pub mod memory;
pub mod persistence;
