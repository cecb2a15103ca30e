use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::models::case::{CaseContent, GenerationParams};
use crate::services::errors::GenerationError;

#[cfg(test)]
use mockall::automock;

/// External pipeline producing the public/private case split.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CaseGenerator: Send + Sync {
    async fn generate(&self, params: &GenerationParams) -> Result<CaseContent, GenerationError>;
}

pub struct HttpCaseGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpCaseGenerator {
    pub fn new(url: &str) -> Self {
        HttpCaseGenerator {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl CaseGenerator for HttpCaseGenerator {
    async fn generate(&self, params: &GenerationParams) -> Result<CaseContent, GenerationError> {
        let response = self
            .client
            .post(&self.url)
            .json(params)
            .send()
            .await
            .map_err(|e| GenerationError::Upstream(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Case generator rate limited the request");
                return Err(GenerationError::RateLimited);
            }
            status if !status.is_success() => {
                return Err(GenerationError::Upstream(format!(
                    "generator responded with {}",
                    status
                )));
            }
            _ => {}
        }

        let content: CaseContent = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidContent(e.to_string()))?;
        content.validate().map_err(GenerationError::InvalidContent)?;

        info!(
            "Generated case '{}' with {} layers",
            content.public.title,
            content.public.layers.len()
        );
        Ok(content)
    }
}

/// Generator used when no endpoint is configured: always fails, so matches
/// stay in `generating` until an operator wires a real pipeline.
pub struct UnavailableCaseGenerator;

#[async_trait]
impl CaseGenerator for UnavailableCaseGenerator {
    async fn generate(&self, _params: &GenerationParams) -> Result<CaseContent, GenerationError> {
        Err(GenerationError::Upstream(
            "no case generator is configured".to_string(),
        ))
    }
}
