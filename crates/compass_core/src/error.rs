use thiserror::Error;

use crate::resource::ResourceType;

pub type Result<T, E = CompassError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CompassError {
    #[error("object not found: {resource} with id {id}")]
    NotFound { resource: ResourceType, id: String },

    #[error("object is not unique: {resource}")]
    NotUnique { resource: ResourceType },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cannot read tenant from context")]
    TenantRequired,

    #[error("internal: {0}")]
    Internal(String),

    #[error("{message}: {source}")]
    Wrapped {
        message: String,
        #[source]
        source: Box<CompassError>,
    },
}

impl CompassError {
    pub fn not_found(resource: ResourceType, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Innermost error of a `Wrapped` chain.
    pub fn root(&self) -> &CompassError {
        let mut current = self;
        while let Self::Wrapped { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }

    pub fn is_not_unique(&self) -> bool {
        matches!(self.root(), Self::NotUnique { .. })
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::NotUnique { .. } => 409,
            Self::InvalidData(_) => 400,
            Self::InvalidOperation(_) => 400,
            Self::Unauthorized(_) => 403,
            Self::Conflict(_) => 409,
            Self::TenantRequired => 401,
            Self::Internal(_) => 500,
            Self::Wrapped { source, .. } => source.http_status(),
        }
    }
}

impl From<anyhow::Error> for CompassError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for CompassError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData(err.to_string())
    }
}

/// Adds "while doing X" context to an error without reclassifying it.
pub trait WrapErr<T> {
    fn wrap_err(self, message: impl Into<String>) -> Result<T>;

    fn wrap_err_with<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> WrapErr<T> for Result<T> {
    fn wrap_err(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|source| CompassError::Wrapped {
            message: message.into(),
            source: Box::new(source),
        })
    }

    fn wrap_err_with<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| CompassError::Wrapped {
            message: f().into(),
            source: Box::new(source),
        })
    }
}
