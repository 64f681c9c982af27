//! Error types for the storage and query layers.

/// Failures raised by document store implementations.
///
/// Stores return these through `anyhow::Error`; callers recover the variant
/// with `downcast_ref`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("unknown database: {0}")]
    UnknownDatabase(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures surfaced by the query service.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The translator could not produce an executable query.
    #[error("{0}")]
    Unresolved(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("unknown database: {0}")]
    UnknownDatabase(String),
    #[error("store failure: {0}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::UnknownCollection(name)) => Self::UnknownCollection(name.clone()),
            Some(StoreError::UnknownDatabase(name)) => Self::UnknownDatabase(name.clone()),
            Some(StoreError::InvalidFilter(msg) | StoreError::InvalidRequest(msg)) => {
                Self::InvalidRequest(msg.clone())
            }
            None => Self::Store(err),
        }
    }
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        anyhow::Error::new(err).into()
    }
}

impl QueryError {
    /// Short label used as a metrics outcome.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unresolved(_) => "unresolved",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnknownCollection(_) | Self::UnknownDatabase(_) => "not_found",
            Self::Store(_) => "store_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_through_anyhow() {
        let err: QueryError = anyhow::Error::new(StoreError::UnknownCollection("widgets".into())).into();
        assert!(matches!(err, QueryError::UnknownCollection(ref n) if n == "widgets"));
        assert_eq!(err.kind(), "not_found");

        let err: QueryError = anyhow::Error::new(StoreError::InvalidFilter("bad $op".into())).into();
        assert!(matches!(err, QueryError::InvalidRequest(_)));

        let err: QueryError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, QueryError::Store(_)));
        assert_eq!(err.to_string(), "store failure: connection reset");
    }
}
