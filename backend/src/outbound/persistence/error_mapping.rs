//! Translation of pool and Diesel failures into repository errors.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::SpeakerRequestRepositoryError;

use super::pool::PoolError;

/// Pool failures mean the database is unreachable.
pub(crate) fn map_pool_error(error: PoolError) -> SpeakerRequestRepositoryError {
    debug!(error = %error, "connection pool failure");
    SpeakerRequestRepositoryError::connection(error.message())
}

/// Map Diesel failures to connection or query errors.
///
/// Constraint violations other than the pair key surface as query errors;
/// the pair key is handled by the insert path before reaching here.
pub(crate) fn map_diesel_error(error: DieselError) -> SpeakerRequestRepositoryError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        other => debug!(error = %other, "diesel operation failed"),
    }

    match error {
        DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::UnableToSendCommand,
            _,
        )
        | DieselError::BrokenTransactionManager => {
            SpeakerRequestRepositoryError::connection("database connection error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            SpeakerRequestRepositoryError::query("concurrent update conflict")
        }
        DieselError::NotFound => SpeakerRequestRepositoryError::query("record not found"),
        DieselError::QueryBuilderError(_) => {
            SpeakerRequestRepositoryError::query("database query error")
        }
        _ => SpeakerRequestRepositoryError::query("database error"),
    }
}
