use std::sync::Arc;

use lambda_runtime::{run, service_fn, Error};
use tracing::warn;

mod processor;

use processor::MatchmakingProcessor;
use shared::config::AppConfig;
use shared::repositories::fanout_repository::{
    ApiGatewayEventPublisher, EventPublisher, LoggingEventPublisher,
};
use shared::repositories::Repositories;
use shared::services::case_generator::{CaseGenerator, HttpCaseGenerator, UnavailableCaseGenerator};
use shared::services::clock::SystemClock;
use shared::services::Services;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = AppConfig::from_env()?;
    let sdk_config = aws_config::load_from_env().await;
    let client = aws_sdk_dynamodb::Client::new(&sdk_config);

    let publisher: Arc<dyn EventPublisher> = match config.websocket_endpoint.as_deref() {
        Some(endpoint) => Arc::new(ApiGatewayEventPublisher::new(
            &sdk_config,
            client.clone(),
            &config.connections_table,
            endpoint,
        )),
        None => Arc::new(LoggingEventPublisher),
    };
    let generator: Arc<dyn CaseGenerator> = match config.case_generator_url.as_deref() {
        Some(url) => Arc::new(HttpCaseGenerator::new(url)),
        None => {
            warn!("CASE_GENERATOR_URL not set, paired matches will wait for a case");
            Arc::new(UnavailableCaseGenerator)
        }
    };

    let services = Services::new(
        Repositories::dynamodb(client, &config),
        generator,
        publisher,
        Arc::new(SystemClock),
    );
    let processor = MatchmakingProcessor::new(services.matchmaking);

    // Run the Lambda function
    run(service_fn(
        move |event: lambda_runtime::LambdaEvent<aws_lambda_events::event::dynamodb::Event>| {
            let processor = processor.clone();
            async move { processor.process_event(event.payload).await }
        },
    ))
    .await
}
