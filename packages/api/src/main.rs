use std::env::set_var;
use std::sync::Arc;

use lambda_http::{run, Error};
use tracing::{info, warn};

pub mod app;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use shared::config::{AppConfig, StoreBackend};
use shared::repositories::fanout_repository::{
    ApiGatewayEventPublisher, EventPublisher, LoggingEventPublisher,
};
use shared::repositories::Repositories;
use shared::services::auth_service::AuthService;
use shared::services::case_generator::{CaseGenerator, HttpCaseGenerator, UnavailableCaseGenerator};
use shared::services::clock::SystemClock;
use shared::services::Services;

#[tokio::main]
async fn main() -> Result<(), Error> {
    set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");

    // required to enable CloudWatch error logging by the runtime
    lambda_http::tracing::init_default_subscriber();

    let config = AppConfig::from_env()?;

    let (repositories, publisher): (Repositories, Arc<dyn EventPublisher>) =
        match config.store_backend {
            StoreBackend::DynamoDb => {
                let sdk_config = aws_config::load_from_env().await;
                let client = aws_sdk_dynamodb::Client::new(&sdk_config);
                let publisher: Arc<dyn EventPublisher> = match config.websocket_endpoint.as_deref() {
                    Some(endpoint) => Arc::new(ApiGatewayEventPublisher::new(
                        &sdk_config,
                        client.clone(),
                        &config.connections_table,
                        endpoint,
                    )),
                    None => {
                        warn!("WEBSOCKET_API_ENDPOINT not set, events are only logged");
                        Arc::new(LoggingEventPublisher)
                    }
                };
                (Repositories::dynamodb(client, &config), publisher)
            }
            StoreBackend::Memory => {
                info!("Using the in-memory store");
                (Repositories::in_memory(), Arc::new(LoggingEventPublisher))
            }
        };

    let generator: Arc<dyn CaseGenerator> = match config.case_generator_url.as_deref() {
        Some(url) => Arc::new(HttpCaseGenerator::new(url)),
        None => {
            warn!("CASE_GENERATOR_URL not set, matches cannot get a case");
            Arc::new(UnavailableCaseGenerator)
        }
    };

    let services = Services::new(repositories, generator, publisher, Arc::new(SystemClock));
    let app_state = state::AppState {
        auth_service: Arc::new(AuthService::new(&config.jwt_secret)),
        services,
        // Without the stream processor nothing else would pair players.
        pair_inline: config.store_backend == StoreBackend::Memory,
    };

    run(app::router(app_state)).await
}
