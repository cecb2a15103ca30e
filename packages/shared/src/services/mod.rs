pub mod answer_matcher;
pub mod auth_service;
pub mod case_generator;
pub mod clock;
pub mod errors;
pub mod lobby_service;
pub mod match_service;
pub mod matchmaking_service;
pub mod notifier;
pub mod projection;
pub mod ranked_service;
pub mod rating;
pub mod reconnection_service;
pub mod sabotage_service;
pub mod scoring;
pub mod session_service;
pub mod versioned;

use std::sync::Arc;

use crate::repositories::fanout_repository::EventPublisher;
use crate::repositories::Repositories;
use case_generator::CaseGenerator;
use clock::Clock;
use lobby_service::LobbyService;
use match_service::MatchService;
use matchmaking_service::MatchmakingService;
use notifier::Notifier;
use ranked_service::RankedService;
use reconnection_service::ReconnectionService;
use sabotage_service::SabotageService;

/// Every engine service, wired once at startup from explicit handles.
#[derive(Clone)]
pub struct Services {
    pub lobby: Arc<LobbyService>,
    pub matches: Arc<MatchService>,
    pub sabotage: Arc<SabotageService>,
    pub matchmaking: Arc<MatchmakingService>,
    pub ranked: Arc<RankedService>,
    pub reconnection: Arc<ReconnectionService>,
}

impl Services {
    pub fn new(
        repositories: Repositories,
        generator: Arc<dyn CaseGenerator>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let notifier = Notifier::new(publisher);
        let ranked = Arc::new(RankedService::new(
            repositories.profiles.clone(),
            clock.clone(),
        ));
        let matches = Arc::new(MatchService::new(
            repositories.clone(),
            generator,
            notifier.clone(),
            clock.clone(),
            ranked.clone(),
        ));
        let lobby = Arc::new(LobbyService::new(
            repositories.clone(),
            matches.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let sabotage = Arc::new(SabotageService::new(
            repositories.clone(),
            matches.clone(),
            notifier.clone(),
            clock.clone(),
        ));
        let matchmaking = Arc::new(MatchmakingService::new(
            repositories.clone(),
            ranked.clone(),
            matches.clone(),
            notifier,
            clock.clone(),
        ));
        let reconnection = Arc::new(ReconnectionService::new(repositories, matches.clone(), clock));

        Services {
            lobby,
            matches,
            sabotage,
            matchmaking,
            ranked,
            reconnection,
        }
    }
}
