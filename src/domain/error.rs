use thiserror::Error;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a warehouse. Fixture operations surface these as-is.
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Already exists: {resource}")]
    AlreadyExists { resource: String },

    #[error("Access denied: {message}")]
    PermissionDenied { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Precondition failed: {message}")]
    PreconditionFailed { message: String },

    #[error("Service error {code}: {message}")]
    Service { code: u16, message: String },

    #[error("Transport error")]
    Transport {
        #[source]
        source: BoxedError,
    },
}

impl WarehouseError {
    pub fn not_found(resource: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
        }
    }

    pub fn already_exists(resource: impl ToString) -> Self {
        Self::AlreadyExists {
            resource: resource.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn transport(e: impl Into<BoxedError>) -> Self {
        Self::Transport { source: e.into() }
    }

    /// HTTP status the REST surface uses for this kind of failure.
    pub fn status_code(&self) -> u16 {
        match self {
            WarehouseError::NotFound { .. } => 404,
            WarehouseError::AlreadyExists { .. } => 409,
            WarehouseError::PermissionDenied { .. } => 403,
            WarehouseError::InvalidArgument { .. } => 400,
            WarehouseError::PreconditionFailed { .. } => 412,
            WarehouseError::Service { code, .. } => *code,
            WarehouseError::Transport { .. } => 503,
        }
    }

    /// Inverse of [`Self::status_code`] for errors read off the wire.
    pub fn from_status(code: u16, message: String) -> Self {
        match code {
            404 => WarehouseError::NotFound {
                resource: strip_prefix(message, &["Not found: "]),
            },
            409 => WarehouseError::AlreadyExists {
                resource: strip_prefix(message, &["Already exists: ", "Already Exists: "]),
            },
            401 | 403 => WarehouseError::PermissionDenied { message },
            400 => WarehouseError::InvalidArgument { message },
            412 => WarehouseError::PreconditionFailed { message },
            code => WarehouseError::Service { code, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WarehouseError::NotFound { .. })
    }
}

fn strip_prefix(message: String, prefixes: &[&str]) -> String {
    prefixes
        .iter()
        .find_map(|p| message.strip_prefix(p))
        .map(str::to_string)
        .unwrap_or(message)
}

pub type Result<T, E = WarehouseError> = std::result::Result<T, E>;
