pub mod repository_errors;

pub use repository_errors::RepositoryError;
