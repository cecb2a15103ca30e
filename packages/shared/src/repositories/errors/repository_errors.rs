#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryError {
    NotFound,
    AlreadyExists,
    /// The stored document moved on since it was read.
    VersionConflict,
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::NotFound => write!(f, "Record not found"),
            RepositoryError::AlreadyExists => write!(f, "Record already exists"),
            RepositoryError::VersionConflict => {
                write!(f, "Record was modified concurrently")
            }
            RepositoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            RepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<serde_dynamo::Error> for RepositoryError {
    fn from(err: serde_dynamo::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
