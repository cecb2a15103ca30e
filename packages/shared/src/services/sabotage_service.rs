//! Timed interference between players, plus the mechanism check: a graded
//! two-question challenge that doubles as an anti-cheat probe.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::constants::{
    MECHANISM_CHECK_PASS_THRESHOLD, MECHANISM_CHECK_PENALTY, MECHANISM_CHECK_QUESTIONS,
    MECHANISM_CHECK_WINDOW_MS,
};
use crate::models::case::MechanismQuestionPool;
use crate::models::game_match::{
    Match, MatchStatus, MechanismCheck, MechanismOutcome, PlayerResult, SabotageEvent, SabotageType,
};
use crate::models::requests::MechanismAnswer;
use crate::models::views::{MechanismCheckIssued, MechanismCheckResult};
use crate::repositories::fanout_repository::{match_channel, player_channel};
use crate::repositories::Repositories;
use crate::services::clock::Clock;
use crate::services::errors::GameError;
use crate::services::match_service::MatchService;
use crate::services::notifier::Notifier;
use crate::services::projection;
use crate::services::session_service::verify_token;
use crate::services::versioned::update_match;

fn require_active(game_match: &Match) -> Result<(), GameError> {
    if game_match.status != MatchStatus::Active {
        return Err(GameError::InvalidState(format!(
            "match is {:?}, sabotage needs an active match",
            game_match.status
        )));
    }
    Ok(())
}

/// Caster and target checks shared by both kinds of cast.
fn check_parties(
    game_match: &Match,
    caster: &str,
    target: &str,
    token: Option<&str>,
) -> Result<(), GameError> {
    require_active(game_match)?;
    let caster_result = game_match
        .player(caster)
        .ok_or_else(|| GameError::Forbidden("not a player in this match".to_string()))?;
    verify_token(&caster_result.session_token, token)?;
    let target_result = game_match
        .player(target)
        .ok_or_else(|| GameError::NotFound("Target player".to_string()))?;
    if target_result.finished {
        return Err(GameError::InvalidState(
            "target has already finished".to_string(),
        ));
    }
    Ok(())
}

fn draw_questions(pool: &MechanismQuestionPool) -> Vec<String> {
    let ids: Vec<&str> = pool.all().map(|question| question.id.as_str()).collect();
    ids.choose_multiple(&mut rand::thread_rng(), MECHANISM_CHECK_QUESTIONS)
        .map(|id| id.to_string())
        .collect()
}

/// Counts answers matching the pool, each issued question at most once.
fn grade(pool: &MechanismQuestionPool, question_ids: &[String], answers: &[MechanismAnswer]) -> usize {
    let mut seen = HashSet::new();
    answers
        .iter()
        .filter(|answer| question_ids.contains(&answer.question_id))
        .filter(|answer| seen.insert(answer.question_id.clone()))
        .filter(|answer| {
            pool.find(&answer.question_id)
                .is_some_and(|question| question.correct_index == answer.choice)
        })
        .count()
}

/// Closes a pending check exactly once. Failure costs a wrong guess unless
/// the player's result is already frozen.
fn resolve_check(player: &mut PlayerResult, correct_count: usize, now: DateTime<Utc>) -> Option<MechanismCheckResult> {
    let check = player.mechanism_check.as_mut().filter(|check| check.pending)?;
    let timed_out = now > check.deadline;
    let passed = !timed_out && correct_count >= MECHANISM_CHECK_PASS_THRESHOLD;
    check.pending = false;
    check.outcome = Some(MechanismOutcome {
        passed,
        timed_out,
        correct_count,
        resolved_at: now,
    });

    let penalty_applied = !passed && !player.finished;
    if penalty_applied {
        player.wrong_guesses += MECHANISM_CHECK_PENALTY;
    }
    Some(MechanismCheckResult {
        passed,
        timed_out,
        correct_count,
        penalty_applied,
        wrong_guesses: player.wrong_guesses,
    })
}

/// A resolved match is frozen: nothing is overdue once the last player is in.
fn overdue_checks(game_match: &Match, now: DateTime<Utc>) -> Vec<String> {
    if game_match.status >= MatchStatus::Resolution {
        return Vec::new();
    }
    game_match
        .players
        .iter()
        .filter(|player| {
            player
                .mechanism_check
                .as_ref()
                .is_some_and(|check| check.pending && now > check.deadline)
        })
        .map(|player| player.identity.clone())
        .collect()
}

#[derive(Clone)]
pub struct SabotageService {
    repositories: Repositories,
    matches: Arc<MatchService>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl SabotageService {
    pub fn new(
        repositories: Repositories,
        matches: Arc<MatchService>,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        SabotageService {
            repositories,
            matches,
            notifier,
            clock,
        }
    }

    pub async fn cast_sabotage(
        &self,
        match_id: &str,
        caster: &str,
        target: &str,
        sabotage_type: SabotageType,
        token: Option<&str>,
    ) -> Result<SabotageEvent, GameError> {
        if sabotage_type == SabotageType::MechanismCheck {
            return Err(GameError::ValidationError(
                "mechanism checks are cast through their own operation".to_string(),
            ));
        }
        if caster == target {
            return Err(GameError::ValidationError("cannot sabotage yourself".to_string()));
        }

        let update = update_match(
            self.repositories.matches.as_ref(),
            self.clock.as_ref(),
            match_id,
            |game_match, now| {
                if !game_match.sabotage_policy.enabled {
                    return Err(GameError::Forbidden("sabotage is disabled".to_string()));
                }
                check_parties(game_match, caster, target, token)?;
                let cap = game_match.sabotage_policy.max_per_player;

                let caster_result = game_match
                    .player_mut(caster)
                    .ok_or_else(|| GameError::Forbidden("not a player in this match".to_string()))?;
                if caster_result.sabotages_used >= cap {
                    return Err(GameError::RateLimited(format!(
                        "at most {} sabotages per match",
                        cap
                    )));
                }
                caster_result.sabotages_used += 1;

                if sabotage_type == SabotageType::LockTax {
                    if let Some(target_result) = game_match.player_mut(target) {
                        target_result.lock_tax_armed += 1;
                    }
                }

                let event = SabotageEvent {
                    sabotage_type,
                    from_identity: caster.to_string(),
                    to_identity: target.to_string(),
                    fired_at: now,
                    duration_ms: sabotage_type.duration_ms(),
                };
                game_match.sabotage_events.push(event.clone());
                game_match.record(now, caster, format!("cast {} on {}", sabotage_type.as_str(), target));
                Ok(event)
            },
        )
        .await?;
        if update.activated {
            self.matches.on_activated(&update.game_match).await;
        }

        info!(
            "{} cast {} on {} in match {}",
            caster,
            sabotage_type.as_str(),
            target,
            match_id
        );
        self.notifier
            .notify(&match_channel(match_id), "sabotage_fired", &update.value)
            .await;
        Ok(update.value)
    }

    pub async fn cast_mechanism_check(
        &self,
        match_id: &str,
        caster: &str,
        target: &str,
        token: Option<&str>,
    ) -> Result<MechanismCheckIssued, GameError> {
        if caster == target {
            return Err(GameError::ValidationError("cannot check yourself".to_string()));
        }
        let current = self.matches.load_match(match_id).await?;
        let case = self.matches.require_case(&current).await?;
        let pool = &case.content.private.mechanism_questions;
        if pool.len() < MECHANISM_CHECK_QUESTIONS {
            return Err(GameError::InvalidState(
                "case has too few mechanism questions".to_string(),
            ));
        }
        let question_ids = draw_questions(pool);

        let update = update_match(
            self.repositories.matches.as_ref(),
            self.clock.as_ref(),
            match_id,
            |game_match, now| {
                if !game_match.sabotage_policy.mechanism_check {
                    return Err(GameError::Forbidden(
                        "mechanism checks are disabled".to_string(),
                    ));
                }
                check_parties(game_match, caster, target, token)?;
                if game_match.player(caster).is_some_and(|p| p.mechanism_check_cast) {
                    return Err(GameError::AlreadyUsed(
                        "mechanism check already cast this match".to_string(),
                    ));
                }
                if game_match.player(target).is_some_and(|p| p.mechanism_check.is_some()) {
                    return Err(GameError::AlreadyUsed(
                        "target was already checked this match".to_string(),
                    ));
                }

                let deadline = now + Duration::milliseconds(MECHANISM_CHECK_WINDOW_MS);
                if let Some(caster_result) = game_match.player_mut(caster) {
                    caster_result.mechanism_check_cast = true;
                }
                if let Some(target_result) = game_match.player_mut(target) {
                    target_result.mechanism_check = Some(MechanismCheck {
                        pending: true,
                        caster_identity: caster.to_string(),
                        issued_at: now,
                        deadline,
                        question_ids: question_ids.clone(),
                        outcome: None,
                    });
                }
                game_match.sabotage_events.push(SabotageEvent {
                    sabotage_type: SabotageType::MechanismCheck,
                    from_identity: caster.to_string(),
                    to_identity: target.to_string(),
                    fired_at: now,
                    duration_ms: MECHANISM_CHECK_WINDOW_MS,
                });
                game_match.record(now, caster, format!("mechanism check on {}", target));
                Ok(deadline)
            },
        )
        .await?;
        if update.activated {
            self.matches.on_activated(&update.game_match).await;
        }

        let issued = MechanismCheckIssued {
            target_identity: target.to_string(),
            deadline: update.value,
            questions: projection::question_prompts(pool, &question_ids),
        };
        info!("{} issued a mechanism check to {} in match {}", caster, target, match_id);
        self.notifier
            .notify(&player_channel(target), "mechanism_check_issued", &issued)
            .await;
        self.notifier
            .notify(
                &match_channel(match_id),
                "sabotage_fired",
                &update.game_match.sabotage_events.last(),
            )
            .await;
        Ok(issued)
    }

    /// Grades the target's answers. Late answers fail whatever they say; a
    /// second submission finds nothing pending.
    pub async fn answer_mechanism_check(
        &self,
        match_id: &str,
        identity: &str,
        answers: &[MechanismAnswer],
        token: Option<&str>,
    ) -> Result<MechanismCheckResult, GameError> {
        let current = self.matches.load_match(match_id).await?;
        let case = self.matches.require_case(&current).await?;
        let pool = &case.content.private.mechanism_questions;

        let update = update_match(
            self.repositories.matches.as_ref(),
            self.clock.as_ref(),
            match_id,
            |game_match, now| {
                if game_match.status >= MatchStatus::Resolution {
                    return Err(GameError::InvalidState(format!(
                        "match is {:?}, mechanism checks are closed",
                        game_match.status
                    )));
                }
                let player = game_match
                    .player_mut(identity)
                    .ok_or_else(|| GameError::Forbidden("not a player in this match".to_string()))?;
                verify_token(&player.session_token, token)?;
                let question_ids = player
                    .mechanism_check
                    .as_ref()
                    .filter(|check| check.pending)
                    .map(|check| check.question_ids.clone())
                    .ok_or(GameError::NoPendingCheck)?;
                let correct_count = grade(pool, &question_ids, answers);
                let result = resolve_check(player, correct_count, now).ok_or(GameError::NoPendingCheck)?;
                let event = if result.passed {
                    "passed the mechanism check"
                } else if result.timed_out {
                    "answered the mechanism check too late"
                } else {
                    "failed the mechanism check"
                };
                game_match.record(now, identity, event);
                Ok(result)
            },
        )
        .await?;
        if update.activated {
            self.matches.on_activated(&update.game_match).await;
        }

        let result = update.value;
        info!(
            "{} answered a mechanism check in match {}: passed={} timed_out={}",
            identity, match_id, result.passed, result.timed_out
        );
        self.notifier
            .notify(
                &match_channel(match_id),
                "mechanism_check_resolved",
                &projection::match_view(&update.game_match, None, None),
            )
            .await;
        Ok(result)
    }

    /// Expires checks whose deadline passed without an answer. Returns how
    /// many were closed; a match with nothing overdue is not written.
    pub async fn sweep_expired_checks(&self, match_id: &str) -> Result<usize, GameError> {
        let current = self.matches.load_match(match_id).await?;
        if overdue_checks(&current, self.clock.now()).is_empty() {
            return Ok(0);
        }

        let update = update_match(
            self.repositories.matches.as_ref(),
            self.clock.as_ref(),
            match_id,
            |game_match, now| {
                let expired = overdue_checks(game_match, now);
                for identity in &expired {
                    if let Some(player) = game_match.player_mut(identity) {
                        resolve_check(player, 0, now);
                    }
                    game_match.record(now, identity, "mechanism check expired");
                }
                Ok(expired.len())
            },
        )
        .await?;

        if update.value > 0 {
            warn!("Expired {} mechanism checks in match {}", update.value, match_id);
            self.notifier
                .notify(
                    &match_channel(match_id),
                    "mechanism_check_resolved",
                    &projection::match_view(&update.game_match, None, None),
                )
                .await;
        }
        Ok(update.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::case::fixtures;
    use crate::models::room::RoomSettings;
    use crate::services::test_support::Harness;

    fn answer(question_id: &str, choice: usize) -> MechanismAnswer {
        MechanismAnswer {
            question_id: question_id.to_string(),
            choice,
        }
    }

    #[test]
    fn test_draw_takes_two_distinct_ids_from_both_pools() {
        let pool = fixtures::mi_case().private.mechanism_questions;
        for _ in 0..20 {
            let ids = draw_questions(&pool);
            assert_eq!(ids.len(), 2);
            assert_ne!(ids[0], ids[1]);
            assert!(ids.iter().all(|id| pool.find(id).is_some()));
        }
    }

    #[test]
    fn test_grade_counts_each_question_once() {
        let pool = fixtures::mi_case().private.mechanism_questions;
        let issued = vec!["sc-1".to_string(), "cp-1".to_string()];

        assert_eq!(grade(&pool, &issued, &[answer("sc-1", 0), answer("cp-1", 2)]), 2);
        assert_eq!(grade(&pool, &issued, &[answer("sc-1", 0), answer("sc-1", 0)]), 1);
        // Correct answer to a question that was not issued does not count.
        assert_eq!(grade(&pool, &issued, &[answer("sc-2", 1), answer("cp-1", 2)]), 1);
        assert_eq!(grade(&pool, &issued, &[]), 0);
    }

    fn correct_answers(issued: &MechanismCheckIssued) -> Vec<MechanismAnswer> {
        let pool = fixtures::mi_case().private.mechanism_questions;
        issued
            .questions
            .iter()
            .map(|prompt| {
                let question = pool.find(&prompt.id).unwrap();
                answer(&prompt.id, question.correct_index)
            })
            .collect()
    }

    fn wrong_answers(issued: &MechanismCheckIssued) -> Vec<MechanismAnswer> {
        correct_answers(issued)
            .into_iter()
            .map(|a| answer(&a.question_id, (a.choice + 1) % 3))
            .collect()
    }

    #[tokio::test]
    async fn test_sabotage_is_capped_per_player() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;
        let sabotage = &harness.services.sabotage;

        let event = sabotage
            .cast_sabotage(&active.match_id, "alice", "bob", SabotageType::FogOfWar, Some(&active.host.session_token))
            .await
            .unwrap();
        assert_eq!(event.duration_ms, 5_000);
        assert_eq!(event.to_identity, "bob");
        sabotage
            .cast_sabotage(&active.match_id, "alice", "bob", SabotageType::JammedSubmit, None)
            .await
            .unwrap();

        let third = sabotage
            .cast_sabotage(&active.match_id, "alice", "bob", SabotageType::SwapFocus, None)
            .await;
        assert!(matches!(third, Err(GameError::RateLimited(_))));

        // The cap is per caster.
        sabotage
            .cast_sabotage(&active.match_id, "bob", "alice", SabotageType::SwapFocus, None)
            .await
            .unwrap();
        assert_eq!(harness.publisher.events_named("sabotage_fired").len(), 3);

        let game_match = harness.services.matches.load_match(&active.match_id).await.unwrap();
        assert_eq!(game_match.sabotage_events.len(), 3);
        assert_eq!(game_match.player("alice").unwrap().sabotages_used, 2);
    }

    #[tokio::test]
    async fn test_sabotage_rejections() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;
        let sabotage = &harness.services.sabotage;
        let id = active.match_id.as_str();

        let own = sabotage.cast_sabotage(id, "alice", "alice", SabotageType::FogOfWar, None).await;
        assert!(matches!(own, Err(GameError::ValidationError(_))));
        let check = sabotage
            .cast_sabotage(id, "alice", "bob", SabotageType::MechanismCheck, None)
            .await;
        assert!(matches!(check, Err(GameError::ValidationError(_))));
        let nobody = sabotage.cast_sabotage(id, "alice", "carol", SabotageType::FogOfWar, None).await;
        assert!(matches!(nobody, Err(GameError::NotFound(_))));
        let stolen = sabotage
            .cast_sabotage(id, "alice", "bob", SabotageType::FogOfWar, Some(&active.guest.session_token))
            .await;
        assert_eq!(stolen, Err(GameError::SessionMismatch));

        harness.services.matches.submit_guess(id, "bob", "mi", None).await.unwrap();
        let finished = sabotage.cast_sabotage(id, "alice", "bob", SabotageType::FogOfWar, None).await;
        assert!(matches!(finished, Err(GameError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_disabled_policy_forbids_casts() {
        let harness = Harness::new();
        let mut settings = RoomSettings::default();
        settings.sabotage.enabled = false;
        settings.sabotage.mechanism_check = false;
        let active = harness.active_match(settings).await;
        let sabotage = &harness.services.sabotage;

        let plain = sabotage
            .cast_sabotage(&active.match_id, "alice", "bob", SabotageType::FogOfWar, None)
            .await;
        assert!(matches!(plain, Err(GameError::Forbidden(_))));
        let check = sabotage.cast_mechanism_check(&active.match_id, "alice", "bob", None).await;
        assert!(matches!(check, Err(GameError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_sabotage_needs_an_active_match() {
        let harness = Harness::new();
        let (host, _) = harness.ready_room(RoomSettings::default()).await;
        let view = harness.services.lobby.start_match(&host.room_id, "alice").await.unwrap();

        let result = harness
            .services
            .sabotage
            .cast_sabotage(&view.match_id, "alice", "bob", SabotageType::FogOfWar, None)
            .await;
        assert!(matches!(result, Err(GameError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_mechanism_check_passes_with_correct_answers() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;
        let sabotage = &harness.services.sabotage;

        let issued = sabotage
            .cast_mechanism_check(&active.match_id, "alice", "bob", None)
            .await
            .unwrap();
        assert_eq!(issued.questions.len(), 2);
        assert_eq!(
            issued.deadline,
            harness.clock.now() + Duration::milliseconds(MECHANISM_CHECK_WINDOW_MS)
        );
        let pushed = harness.publisher.events_named("mechanism_check_issued");
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].channel_key, player_channel("bob"));

        let view = harness
            .services
            .matches
            .get_match_view(&active.match_id, "bob", None)
            .await
            .unwrap();
        assert_eq!(view.me.unwrap().pending_check.unwrap().questions.len(), 2);

        harness.advance_ms(4_000);
        let result = sabotage
            .answer_mechanism_check(&active.match_id, "bob", &correct_answers(&issued), None)
            .await
            .unwrap();
        assert!(result.passed);
        assert!(!result.timed_out);
        assert_eq!(result.correct_count, 2);
        assert!(!result.penalty_applied);
        assert_eq!(result.wrong_guesses, 0);

        let twice = sabotage
            .answer_mechanism_check(&active.match_id, "bob", &correct_answers(&issued), None)
            .await;
        assert_eq!(twice, Err(GameError::NoPendingCheck));
    }

    #[tokio::test]
    async fn test_mechanism_check_once_per_caster_and_target() {
        let harness = Harness::new();
        let settings = RoomSettings {
            team_size: 2,
            ..RoomSettings::default()
        };
        let lobby = &harness.services.lobby;
        let host = lobby.create_room("alice", "Alice", Some(settings)).await.unwrap();
        for name in ["bob", "carol", "dave"] {
            lobby.join_room(&host.room_key, name, name, None).await.unwrap();
        }
        for name in ["alice", "bob", "carol", "dave"] {
            lobby.toggle_ready(&host.room_id, name, None).await.unwrap();
        }
        let view = lobby.start_match(&host.room_id, "alice").await.unwrap();
        harness.advance_ms(crate::constants::COUNTDOWN_MS);
        let sabotage = &harness.services.sabotage;
        let id = view.match_id.as_str();

        sabotage.cast_mechanism_check(id, "alice", "bob", None).await.unwrap();
        let caster_again = sabotage.cast_mechanism_check(id, "alice", "carol", None).await;
        assert!(matches!(caster_again, Err(GameError::AlreadyUsed(_))));
        let target_again = sabotage.cast_mechanism_check(id, "carol", "bob", None).await;
        assert!(matches!(target_again, Err(GameError::AlreadyUsed(_))));

        // Independent of the plain sabotage cap.
        for _ in 0..2 {
            sabotage
                .cast_sabotage(id, "carol", "dave", SabotageType::FogOfWar, None)
                .await
                .unwrap();
        }
        sabotage.cast_mechanism_check(id, "carol", "dave", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_or_late_answers_cost_a_guess() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;
        let sabotage = &harness.services.sabotage;

        let to_bob = sabotage
            .cast_mechanism_check(&active.match_id, "alice", "bob", None)
            .await
            .unwrap();
        let failed = sabotage
            .answer_mechanism_check(&active.match_id, "bob", &wrong_answers(&to_bob), None)
            .await
            .unwrap();
        assert!(!failed.passed);
        assert!(!failed.timed_out);
        assert!(failed.penalty_applied);
        assert_eq!(failed.wrong_guesses, 1);

        let to_alice = sabotage
            .cast_mechanism_check(&active.match_id, "bob", "alice", None)
            .await
            .unwrap();
        harness.advance_ms(MECHANISM_CHECK_WINDOW_MS + 1);
        let late = sabotage
            .answer_mechanism_check(&active.match_id, "alice", &correct_answers(&to_alice), None)
            .await
            .unwrap();
        assert!(!late.passed);
        assert!(late.timed_out);
        assert_eq!(late.correct_count, 2);
        assert_eq!(late.wrong_guesses, 1);
    }

    #[tokio::test]
    async fn test_sweep_expires_unanswered_checks() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;
        let sabotage = &harness.services.sabotage;
        sabotage
            .cast_mechanism_check(&active.match_id, "alice", "bob", None)
            .await
            .unwrap();

        assert_eq!(sabotage.sweep_expired_checks(&active.match_id).await.unwrap(), 0);
        harness.advance_ms(MECHANISM_CHECK_WINDOW_MS + 1_000);
        assert_eq!(sabotage.sweep_expired_checks(&active.match_id).await.unwrap(), 1);
        assert_eq!(sabotage.sweep_expired_checks(&active.match_id).await.unwrap(), 0);

        let game_match = harness.services.matches.load_match(&active.match_id).await.unwrap();
        let bob = game_match.player("bob").unwrap();
        assert_eq!(bob.wrong_guesses, 1);
        let outcome = bob.mechanism_check.as_ref().unwrap().outcome.as_ref().unwrap();
        assert!(outcome.timed_out);

        let answer_after_sweep = sabotage
            .answer_mechanism_check(&active.match_id, "bob", &[], None)
            .await;
        assert_eq!(answer_after_sweep, Err(GameError::NoPendingCheck));
    }

    #[tokio::test]
    async fn test_failed_check_does_not_touch_finished_player() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;
        let sabotage = &harness.services.sabotage;
        let issued = sabotage
            .cast_mechanism_check(&active.match_id, "alice", "bob", None)
            .await
            .unwrap();
        harness
            .services
            .matches
            .submit_guess(&active.match_id, "bob", "mi", None)
            .await
            .unwrap();

        let result = sabotage
            .answer_mechanism_check(&active.match_id, "bob", &wrong_answers(&issued), None)
            .await
            .unwrap();
        assert!(!result.passed);
        assert!(!result.penalty_applied);
        assert_eq!(result.wrong_guesses, 0);
    }

    #[tokio::test]
    async fn test_ended_match_closes_and_freezes_pending_checks() {
        let harness = Harness::new();
        let active = harness.active_match(RoomSettings::default()).await;
        let sabotage = &harness.services.sabotage;
        let matches = &harness.services.matches;
        let issued = sabotage
            .cast_mechanism_check(&active.match_id, "alice", "bob", None)
            .await
            .unwrap();
        matches.submit_guess(&active.match_id, "bob", "mi", None).await.unwrap();
        let last = matches.submit_guess(&active.match_id, "alice", "mi", None).await.unwrap();
        assert_eq!(last.match_status, MatchStatus::Ended);

        let ended = matches.load_match(&active.match_id).await.unwrap();
        let check = ended.player("bob").unwrap().mechanism_check.clone().unwrap();
        assert!(!check.pending);
        assert!(check.outcome.unwrap().timed_out);
        assert_eq!(ended.player("bob").unwrap().wrong_guesses, 0);

        let answer = sabotage
            .answer_mechanism_check(&active.match_id, "bob", &correct_answers(&issued), None)
            .await;
        assert!(matches!(answer, Err(GameError::InvalidState(_))));
        harness.advance_ms(MECHANISM_CHECK_WINDOW_MS + 1);
        assert_eq!(sabotage.sweep_expired_checks(&active.match_id).await.unwrap(), 0);

        let after = matches.load_match(&active.match_id).await.unwrap();
        assert_eq!(after.version, ended.version);
        assert_eq!(after.timeline.len(), ended.timeline.len());
    }
}
