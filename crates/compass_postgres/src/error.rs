//! Maps sqlx failures onto `CompassError`. Driver details are logged here and
//! never leak into the returned message.

use strum::Display;
use tracing::error;

use compass_core::error::CompassError;
use compass_core::resource::ResourceType;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// What the failing statement was doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SqlOperation {
    Create,
    Update,
    Upsert,
    Delete,
    Fetch,
    List,
    Exists,
}

pub fn map_sql_error(err: sqlx::Error, resource_type: ResourceType, op: SqlOperation) -> CompassError {
    match &err {
        sqlx::Error::RowNotFound => return CompassError::not_found(resource_type, ""),
        sqlx::Error::PoolTimedOut => {
            error!(%resource_type, %op, "timeout waiting for a database connection");
            return CompassError::internal("Maximum processing timeout reached");
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return CompassError::NotUnique { resource: resource_type },
            Some(FOREIGN_KEY_VIOLATION) if op == SqlOperation::Delete => {
                return CompassError::InvalidData(
                    "The record cannot be deleted because another record refers to it".into(),
                )
            }
            Some(FOREIGN_KEY_VIOLATION) => return CompassError::InvalidData("Object not found".into()),
            Some(CHECK_VIOLATION) => {
                return CompassError::InvalidData(format!(
                    "{resource_type} violates a check constraint: {}",
                    db.constraint().unwrap_or("unknown")
                ))
            }
            _ => {}
        },
        _ => {}
    }

    error!(%resource_type, %op, error = %err, "unexpected error while executing SQL query");
    CompassError::internal("Unexpected error while executing SQL query")
}
