use thiserror::Error;

pub type GatewayResult<T> = core::result::Result<T, GatewayError>;
pub type StoreResult<T> = core::result::Result<T, StoreError>;

/// Failure reported by a persistence gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{collection} record {id} not found")]
    NotFound { collection: &'static str, id: String },
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("record store answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("decoding record: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("record store returned no rows for {0}")]
    EmptyResponse(&'static str),
    #[error("database connection poisoned")]
    Poisoned,
}

impl GatewayError {
    pub fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        GatewayError::NotFound {
            collection,
            id: id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("persistence failed: {0}")]
    Gateway(#[from] GatewayError),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
