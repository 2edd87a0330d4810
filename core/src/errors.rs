use sea_orm::{DbErr, RuntimeErr, SqlxError};
use thiserror::Error;

/// The error taxonomy every component in this crate reports through. The
/// routing pipeline never propagates one of these past its own entrypoint —
/// each variant instead tells the caller what state was already written and
/// whether an operator or external scheduler can do anything about it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A requested row is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The email cannot be routed as-is (e.g. it failed to parse).
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// A transient condition (DB deadlock, network timeout) that an
    /// external scheduler may retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// A unique-constraint violation on `endpoint_delivery`; always to be
    /// treated as a successful exit, not a failure.
    #[error("duplicate delivery")]
    Duplicate,

    /// A non-2xx response from a webhook receiver. Recorded, never raised.
    #[error("receiver error: {0}")]
    ReceiverError(String),

    /// A programmer-detected invariant breach (missing FK, malformed
    /// internal JSON). The single email is abandoned; the service
    /// continues.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl PipelineError {
    /// Maps a `sea_orm::DbErr` to this taxonomy, recognizing a unique
    /// constraint violation on the given columns as `Duplicate` rather than
    /// a generic `Transient`/`Fatal` failure.
    pub fn from_db_err(err: DbErr, duplicate_constraint: &str) -> Self {
        if is_unique_violation_on(&err, duplicate_constraint) {
            return PipelineError::Duplicate;
        }

        match err {
            DbErr::RecordNotFound(msg) => PipelineError::NotFound(msg),
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
                PipelineError::Transient(err.to_string())
            }
            other => PipelineError::Fatal(other.to_string()),
        }
    }
}

fn is_unique_violation_on(err: &DbErr, constraint_name: &str) -> bool {
    let sqlx_error = match err {
        DbErr::Exec(RuntimeErr::SqlxError(e)) => Some(e),
        DbErr::Query(RuntimeErr::SqlxError(e)) => Some(e),
        _ => None,
    };

    let Some(SqlxError::Database(db_err)) = sqlx_error else {
        return false;
    };

    if !db_err.is_unique_violation() {
        return false;
    }

    db_err
        .constraint()
        .map(|c| c == constraint_name)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_not_found_variant() {
        let err = PipelineError::from_db_err(
            DbErr::RecordNotFound("structured_email".into()),
            "irrelevant",
        );

        assert!(matches!(err, PipelineError::NotFound(_)));
    }
}
