//! Error handling utilities for repositories

use sqlx::Error as SqlxError;
use vote_core::error::DomainError;
use vote_core::value_objects::EntityId;

/// SQLSTATE for serialization_failure
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for deadlock_detected
const DEADLOCK_DETECTED: &str = "40P01";

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    match e {
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) | SqlxError::Tls(_) => {
            DomainError::StoreUnavailable(e.to_string())
        }
        _ => DomainError::DatabaseError(e.to_string()),
    }
}

/// Like [`map_db_error`], but classifies transaction aborts as write conflicts
pub fn map_commit_error(entity_id: &EntityId) -> impl FnOnce(SqlxError) -> DomainError + '_ {
    move |e| {
        let aborted = e
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .is_some_and(|code| code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED);
        if aborted {
            DomainError::WriteConflict(entity_id.clone())
        } else {
            map_db_error(e)
        }
    }
}

/// A stored number that does not fit the domain type
pub fn corrupt_row(what: &str, detail: impl std::fmt::Display) -> DomainError {
    DomainError::DatabaseError(format!("corrupt {what}: {detail}"))
}

pub fn entity_not_found(id: &EntityId) -> DomainError {
    DomainError::EntityNotFound(id.clone())
}
