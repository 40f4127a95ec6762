//! Shared helpers for speaker request integration tests.
//!
//! Each file under `backend/tests/` compiles as its own crate; suites pull
//! this module in with `mod support;` and use what they need.

#![allow(dead_code)]

pub mod atexit_cleanup;
pub mod cluster_skip;
pub mod embedded_postgres;

pub use cluster_skip::handle_cluster_setup_failure;
pub use embedded_postgres::provision_template_database;

/// Render a `postgres` error with its SQLSTATE and server-side detail.
///
/// `postgres::Error`'s `Display` collapses database errors to `db error`,
/// which is useless in CI logs.
pub fn format_postgres_error(error: &postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut summary = format!(
        "postgres error {:?}: {}",
        db_error.code(),
        db_error.message()
    );
    for (label, part) in [
        ("detail", db_error.detail()),
        ("hint", db_error.hint()),
        ("where", db_error.where_()),
    ] {
        if let Some(text) = part {
            summary.push_str("; ");
            summary.push_str(label);
            summary.push_str(": ");
            summary.push_str(text);
        }
    }
    summary
}
