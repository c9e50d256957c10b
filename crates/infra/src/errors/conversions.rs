//! Conversions from external infrastructure errors into domain errors.

use campline_domain::CamplineError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CamplineError);

impl From<InfraError> for CamplineError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CamplineError> for InfraError {
    fn from(value: CamplineError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCamplineError {
    fn into_campline(self) -> CamplineError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CamplineError */
/* -------------------------------------------------------------------------- */

impl IntoCamplineError for SqlError {
    fn into_campline(self) -> CamplineError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CamplineError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CamplineError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        CamplineError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CamplineError::Database("foreign key constraint violation".into())
                    }
                    _ => CamplineError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CamplineError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CamplineError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CamplineError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                CamplineError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidQuery => CamplineError::Database("invalid SQL query".into()),
            other => CamplineError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_campline())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CamplineError */
/* -------------------------------------------------------------------------- */

impl IntoCamplineError for HttpError {
    fn into_campline(self) -> CamplineError {
        if self.is_timeout() {
            return CamplineError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CamplineError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => CamplineError::Auth(message),
                404 => CamplineError::NotFound(message),
                400..=499 => CamplineError::InvalidInput(message),
                500..=599 => CamplineError::Network(message),
                _ => CamplineError::Network(message),
            };
        }

        CamplineError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_campline())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → CamplineError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(CamplineError::Data(format!("JSON error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CamplineError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(CamplineError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
