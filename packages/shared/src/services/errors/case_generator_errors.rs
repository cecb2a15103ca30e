#[derive(Debug, Clone, PartialEq)]
pub enum GenerationError {
    RateLimited,
    Upstream(String),
    InvalidContent(String),
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::RateLimited => write!(f, "Case generator is rate limited"),
            GenerationError::Upstream(msg) => write!(f, "Case generator error: {}", msg),
            GenerationError::InvalidContent(msg) => {
                write!(f, "Case generator returned invalid content: {}", msg)
            }
        }
    }
}

impl std::error::Error for GenerationError {}
