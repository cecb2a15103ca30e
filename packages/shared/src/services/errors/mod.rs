pub mod auth_service_errors;
pub mod case_generator_errors;
pub mod game_errors;

pub use auth_service_errors::AuthServiceError;
pub use case_generator_errors::GenerationError;
pub use game_errors::GameError;
