use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::constants::{
    LOCK_TAX_UNITS, MAX_GUESS_LENGTH, MAX_HISTORY_ENTRIES, MAX_LAYERS, MAX_PENALTY_SCORE,
    MAX_UPDATE_ATTEMPTS,
};
use crate::models::case::StoredCase;
use crate::models::game_match::{GuessEntry, Match, MatchStatus, MechanismOutcome};
use crate::models::membership::{Membership, MembershipKind};
use crate::models::ranked::QueueStatus;
use crate::models::room::RoomStatus;
use crate::models::views::{GuessOutcome, MatchView};
use crate::repositories::errors::RepositoryError;
use crate::repositories::fanout_repository::{match_channel, player_channel, room_channel};
use crate::repositories::Repositories;
use crate::services::answer_matcher::{self, MatchMethod};
use crate::services::case_generator::CaseGenerator;
use crate::services::clock::Clock;
use crate::services::errors::GameError;
use crate::services::notifier::Notifier;
use crate::services::projection;
use crate::services::ranked_service::RankedService;
use crate::services::rating;
use crate::services::scoring::{build_breakdown, ScoreInputs};
use crate::services::session_service::verify_token;
use crate::services::versioned::{update_match, update_room};

struct GuessApplied {
    correct: bool,
    method: Option<MatchMethod>,
    finished: bool,
    resolved: bool,
    new_layer: Option<u32>,
}

/// Freezes scores, breakdown and rating changes into the record. Runs inside
/// the write that finishes the last player, so only one writer can get here.
/// Checks still open when the last player finishes close as timed out, with
/// no penalty: every result is already frozen.
fn resolve(game_match: &mut Match, now: DateTime<Utc>) {
    for player in game_match.players.iter_mut() {
        if let Some(check) = player.mechanism_check.as_mut().filter(|check| check.pending) {
            check.pending = false;
            check.outcome = Some(MechanismOutcome {
                passed: false,
                timed_out: true,
                correct_count: 0,
                resolved_at: now,
            });
        }
    }
    game_match.status = MatchStatus::Resolution;
    game_match.ended_at = Some(now);
    game_match.record(now, "", "all players finished");
    if game_match.is_ranked() {
        game_match.rating_changes = Some(rating::rating_changes(game_match));
    }
    game_match.breakdown = Some(build_breakdown(game_match));
}

fn apply_guess(
    game_match: &mut Match,
    identity: &str,
    raw_guess: &str,
    verdict: answer_matcher::MatchResult,
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<GuessApplied, GameError> {
    if game_match.status != MatchStatus::Active {
        return Err(GameError::InvalidState(format!(
            "match is {:?}, guesses need an active match",
            game_match.status
        )));
    }
    let scoring_mode = game_match.scoring_mode;
    let elapsed_ms = game_match.elapsed_ms(now);
    let player = game_match
        .player_mut(identity)
        .ok_or_else(|| GameError::Forbidden("not a player in this match".to_string()))?;
    verify_token(&player.session_token, token)?;
    if player.finished {
        return Err(GameError::AlreadyFinished);
    }

    player.guess_log.push(GuessEntry {
        text: raw_guess.trim().to_string(),
        correct: verdict.matched,
        at: now,
    });

    let mut new_layer = None;
    let event = if verdict.matched {
        player.finished = true;
        player.solved_at = Some(now);
        player.score = scoring_mode.score(&ScoreInputs {
            layers_used: player.layers_used,
            wrong_guesses: player.wrong_guesses,
            solve_ms: elapsed_ms,
            lock_tax_penalty: player.lock_tax_penalty,
        });
        format!("solved on layer {}", player.layers_used)
    } else {
        player.wrong_guesses += 1;
        if player.layers_used < MAX_LAYERS {
            player.layers_used += 1;
            if player.lock_tax_armed > 0 {
                player.lock_tax_armed -= 1;
                player.lock_tax_penalty += LOCK_TAX_UNITS;
            }
            new_layer = Some(player.layers_used);
            format!("wrong guess, unlocked layer {}", player.layers_used)
        } else {
            player.finished = true;
            player.score = MAX_PENALTY_SCORE;
            "wrong guess with every layer open, out of the race".to_string()
        }
    };
    let finished = player.finished;
    game_match.record(now, identity, event);

    let resolved = game_match.all_finished();
    if resolved {
        resolve(game_match, now);
    }

    Ok(GuessApplied {
        correct: verdict.matched,
        method: verdict.method,
        finished,
        resolved,
        new_layer,
    })
}

#[derive(Clone)]
pub struct MatchService {
    repositories: Repositories,
    generator: Arc<dyn CaseGenerator>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    ranked: Arc<RankedService>,
}

impl MatchService {
    pub fn new(
        repositories: Repositories,
        generator: Arc<dyn CaseGenerator>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
        ranked: Arc<RankedService>,
    ) -> Self {
        MatchService {
            repositories,
            generator,
            notifier,
            clock,
            ranked,
        }
    }

    /// Persists a freshly built match and indexes its players.
    pub async fn register_match(&self, game_match: &Match) -> Result<(), GameError> {
        self.repositories.matches.create_match(game_match).await?;
        let now = self.clock.now();
        for identity in game_match.identities() {
            let membership = Membership::new(&identity, MembershipKind::Match, &game_match.match_id, now);
            self.repositories.memberships.record_membership(&membership).await?;
        }
        info!(
            "Created {:?} match {} for {} players",
            game_match.mode,
            game_match.match_id,
            game_match.players.len()
        );
        Ok(())
    }

    /// Requests case content for a match in `generating`. A failed attempt
    /// only bumps the attempt counter, so the match stays recoverable.
    pub async fn run_generation(&self, match_id: &str) -> Result<Match, GameError> {
        let game_match = self
            .repositories
            .matches
            .get_match(match_id)
            .await?
            .ok_or_else(|| GameError::NotFound("Match".to_string()))?;
        if game_match.status != MatchStatus::Generating {
            return Err(GameError::InvalidState(
                "match is not waiting for a case".to_string(),
            ));
        }

        let content = match self.generator.generate(&game_match.assigned_params).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Case generation for match {} failed: {}", match_id, e);
                let message = e.to_string();
                update_match(
                    self.repositories.matches.as_ref(),
                    self.clock.as_ref(),
                    match_id,
                    |game_match, _| {
                        if game_match.status == MatchStatus::Generating {
                            game_match.generation_attempts += 1;
                            game_match.last_generation_error = Some(message.clone());
                        }
                        Ok(())
                    },
                )
                .await?;
                self.notifier
                    .notify(
                        &match_channel(match_id),
                        "generation_failed",
                        &serde_json::json!({ "match_id": match_id, "error": message }),
                    )
                    .await;
                return Err(GameError::Generation(e));
            }
        };

        let case = StoredCase::new(content, self.clock.now());
        self.repositories.cases.put_case(&case).await?;

        let update = update_match(
            self.repositories.matches.as_ref(),
            self.clock.as_ref(),
            match_id,
            |game_match, now| {
                if game_match.status != MatchStatus::Generating {
                    return Err(GameError::InvalidState(
                        "match already has a case".to_string(),
                    ));
                }
                game_match.generation_attempts += 1;
                game_match.start_countdown(&case.case_id, now);
                game_match.record(now, "", "case attached, countdown started");
                Ok(())
            },
        )
        .await?;
        let game_match = update.game_match;
        info!("Match {} counting down with case {}", match_id, case.case_id);

        if let Some(room_id) = game_match.room_id.as_deref() {
            self.sync_room_status(room_id, RoomStatus::Countdown).await;
        }
        self.notifier
            .notify(
                &match_channel(match_id),
                "countdown_started",
                &projection::match_view(&game_match, None, None),
            )
            .await;
        Ok(game_match)
    }

    pub async fn retry_generation(&self, match_id: &str, identity: &str) -> Result<MatchView, GameError> {
        let game_match = self.load_match(match_id).await?;
        if game_match.player(identity).is_none() {
            return Err(GameError::Forbidden("not a player in this match".to_string()));
        }
        let game_match = self.run_generation(match_id).await?;
        self.view_for(&game_match, identity).await
    }

    /// Reads a match and settles any transition that is due: an elapsed
    /// countdown, or a resolution whose side effects were interrupted.
    pub async fn load_match(&self, match_id: &str) -> Result<Match, GameError> {
        let game_match = self
            .repositories
            .matches
            .get_match(match_id)
            .await?
            .ok_or_else(|| GameError::NotFound("Match".to_string()))?;

        let now = self.clock.now();
        let countdown_due = game_match.status == MatchStatus::Countdown
            && game_match.countdown_ends_at.is_some_and(|ends_at| now >= ends_at);
        if countdown_due {
            let update = update_match(
                self.repositories.matches.as_ref(),
                self.clock.as_ref(),
                match_id,
                |_, _| Ok(()),
            )
            .await?;
            if update.activated {
                self.on_activated(&update.game_match).await;
            }
            return Ok(update.game_match);
        }

        if game_match.status == MatchStatus::Resolution {
            return self.complete_resolution(&game_match).await;
        }
        Ok(game_match)
    }

    pub async fn get_match_view(
        &self,
        match_id: &str,
        identity: &str,
        token: Option<&str>,
    ) -> Result<MatchView, GameError> {
        let game_match = self.load_match(match_id).await?;
        let player = game_match
            .player(identity)
            .ok_or_else(|| GameError::Forbidden("not a player in this match".to_string()))?;
        verify_token(&player.session_token, token)?;
        self.view_for(&game_match, identity).await
    }

    pub async fn submit_guess(
        &self,
        match_id: &str,
        identity: &str,
        raw_guess: &str,
        token: Option<&str>,
    ) -> Result<GuessOutcome, GameError> {
        if raw_guess.trim().is_empty() || raw_guess.chars().count() > MAX_GUESS_LENGTH {
            return Err(GameError::ValidationError(format!(
                "guess must be between 1 and {} characters",
                MAX_GUESS_LENGTH
            )));
        }

        let current = self.load_match(match_id).await?;
        let case = self.require_case(&current).await?;
        let private = &case.content.private;
        let verdict = answer_matcher::is_match(
            raw_guess,
            &private.diagnosis,
            &private.aliases,
            private.accept_rules.as_ref(),
        );

        let update = update_match(
            self.repositories.matches.as_ref(),
            self.clock.as_ref(),
            match_id,
            |game_match, now| apply_guess(game_match, identity, raw_guess, verdict, token, now),
        )
        .await?;
        if update.activated {
            self.on_activated(&update.game_match).await;
        }
        let applied = update.value;
        let mut game_match = update.game_match;

        info!(
            "Player {} guessed in match {}: correct={} finished={}",
            identity, match_id, applied.correct, applied.finished
        );
        let event = if applied.finished { "player_finished" } else { "player_progress" };
        self.notifier
            .notify(
                &match_channel(match_id),
                event,
                &projection::match_view(&game_match, None, None),
            )
            .await;

        if applied.resolved {
            game_match = self.complete_resolution(&game_match).await?;
        }

        let player = game_match
            .player(identity)
            .ok_or_else(|| GameError::Forbidden("not a player in this match".to_string()))?;
        Ok(GuessOutcome {
            correct: applied.correct,
            method: applied.method,
            finished: player.finished,
            layers_used: player.layers_used,
            wrong_guesses: player.wrong_guesses,
            score: player.finished.then_some(player.score),
            new_layer: applied
                .new_layer
                .and_then(|index| projection::layer_view(&case.content.public, index)),
            reveal: player
                .finished
                .then(|| projection::reveal(&case.content.private)),
            match_status: game_match.status,
        })
    }

    /// Side effects of a resolved match, then the final flip to `ended`.
    /// Every step is idempotent, so an interrupted run is finished by the
    /// next reader.
    pub async fn complete_resolution(&self, game_match: &Match) -> Result<Match, GameError> {
        let match_id = game_match.match_id.as_str();
        if game_match.is_ranked() {
            self.ranked.apply_rating_changes(game_match).await?;
            for identity in game_match.identities() {
                if let Err(e) = self.close_queue_entry(&identity, match_id).await {
                    warn!("Could not close queue entry of {}: {}", identity, e);
                }
            }
        }
        if let Some(room_id) = game_match.room_id.as_deref() {
            self.sync_room_status(room_id, RoomStatus::Ended).await;
        }

        let update = update_match(
            self.repositories.matches.as_ref(),
            self.clock.as_ref(),
            match_id,
            |game_match, now| {
                if game_match.status != MatchStatus::Resolution {
                    return Ok(false);
                }
                game_match.status = MatchStatus::Ended;
                game_match.record(now, "", "match ended");
                Ok(true)
            },
        )
        .await?;

        if update.value {
            let winner = update
                .game_match
                .breakdown
                .as_ref()
                .and_then(|breakdown| breakdown.winner.clone());
            info!("Match {} ended, winner {:?}", match_id, winner);
            self.notifier
                .notify(
                    &match_channel(match_id),
                    "match_ended",
                    &projection::match_view(&update.game_match, None, None),
                )
                .await;
        }
        Ok(update.game_match)
    }

    /// Ended matches for `identity`, newest first, in the player's own view.
    pub async fn match_history(&self, identity: &str) -> Result<Vec<MatchView>, GameError> {
        let memberships = self.repositories.memberships.list_memberships(identity).await?;
        let mut history = Vec::new();
        for membership in memberships
            .iter()
            .filter(|membership| membership.kind == MembershipKind::Match)
        {
            if history.len() >= MAX_HISTORY_ENTRIES {
                break;
            }
            let Some(game_match) = self
                .repositories
                .matches
                .get_match(&membership.record_id)
                .await?
            else {
                continue;
            };
            if game_match.status == MatchStatus::Ended {
                history.push(self.view_for(&game_match, identity).await?);
            }
        }
        Ok(history)
    }

    /// Room and fan-out follow-up once a countdown has elapsed.
    pub async fn on_activated(&self, game_match: &Match) {
        info!("Match {} is now active", game_match.match_id);
        if let Some(room_id) = game_match.room_id.as_deref() {
            self.sync_room_status(room_id, RoomStatus::Active).await;
        }
        self.notifier
            .notify(
                &match_channel(&game_match.match_id),
                "match_started",
                &projection::match_view(game_match, None, None),
            )
            .await;
    }

    pub async fn load_case(&self, game_match: &Match) -> Result<Option<StoredCase>, GameError> {
        match game_match.match_case_id.as_deref() {
            Some(case_id) => Ok(self.repositories.cases.get_case(case_id).await?),
            None => Ok(None),
        }
    }

    pub async fn require_case(&self, game_match: &Match) -> Result<StoredCase, GameError> {
        if game_match.match_case_id.is_none() {
            return Err(GameError::InvalidState(
                "match has no case yet".to_string(),
            ));
        }
        self.load_case(game_match)
            .await?
            .ok_or_else(|| GameError::NotFound("Case".to_string()))
    }

    pub async fn view_for(&self, game_match: &Match, identity: &str) -> Result<MatchView, GameError> {
        let case = self.load_case(game_match).await?;
        Ok(projection::match_view(game_match, case.as_ref(), Some(identity)))
    }

    /// Moves the owning room forward. The room is a secondary record here:
    /// failures are logged, never surfaced.
    async fn sync_room_status(&self, room_id: &str, status: RoomStatus) {
        let room = match self.repositories.rooms.get_room(room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => {
                warn!("Match room {} no longer exists", room_id);
                return;
            }
            Err(e) => {
                warn!("Could not load room {}: {}", room_id, e);
                return;
            }
        };
        if room.status >= status {
            return;
        }

        let result = update_room(
            self.repositories.rooms.as_ref(),
            self.clock.as_ref(),
            &room.room_key,
            |room, _| Ok(room.advance_status(status)),
        )
        .await;
        match result {
            Ok((room, true)) => {
                debug!("Room {} moved to {:?}", room_id, status);
                self.notifier
                    .notify(
                        &room_channel(room_id),
                        "room_status_changed",
                        &projection::room_view(&room),
                    )
                    .await;
            }
            Ok((_, false)) => {}
            Err(e) => warn!("Could not move room {} to {:?}: {}", room_id, status, e),
        }
    }

    async fn close_queue_entry(&self, identity: &str, match_id: &str) -> Result<(), GameError> {
        let queue = self.repositories.queue.as_ref();
        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let Some(current) = queue.get_entry(identity).await? else {
                return Ok(());
            };
            if current.match_id.as_deref() != Some(match_id) || current.status == QueueStatus::Ended {
                return Ok(());
            }
            let mut next = current.clone();
            next.status = QueueStatus::Ended;
            next.version = current.version + 1;
            match queue.update_entry(&next, current.version).await {
                Ok(()) => {
                    self.notifier
                        .notify(
                            &player_channel(identity),
                            "queue_ended",
                            &serde_json::json!({ "match_id": match_id }),
                        )
                        .await;
                    return Ok(());
                }
                Err(RepositoryError::VersionConflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(GameError::Conflict(format!("queue entry {}", identity)))
    }
}
