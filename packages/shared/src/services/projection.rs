//! Builds every client-facing view from the authoritative records. These are
//! the only functions allowed to turn a `Room`, `Match` or `StoredCase` into
//! something that leaves the process.

use crate::models::case::{MechanismQuestionPool, PrivateCase, PublicCase, StoredCase};
use crate::models::game_match::{Match, MatchStatus, MechanismCheck, PlayerResult};
use crate::models::ranked::{RankedProfile, RankedQueueEntry, Tier};
use crate::models::room::{Participant, Room};
use crate::models::views::{
    LayerView, LeaderboardEntry, MatchView, MechanismCheckPrompt, MechanismQuestionPrompt,
    OpponentView, ParticipantView, QueueView, Reveal, RoomView, SelfView,
};

fn participant_view(participant: &Participant) -> ParticipantView {
    ParticipantView {
        identity: participant.identity.clone(),
        display_name: participant.display_name.clone(),
        team_id: participant.team_id,
        ready: participant.ready,
        connected: participant.connected,
        joined_at: participant.joined_at,
    }
}

/// Lobby snapshot with session tokens stripped. Same payload for pushes and
/// polls.
pub fn room_view(room: &Room) -> RoomView {
    RoomView {
        room_id: room.room_id.clone(),
        room_key: room.room_key.clone(),
        host_identity: room.host_identity.clone(),
        status: room.status,
        settings: room.settings.clone(),
        capacity: room.capacity(),
        participants: room.participants.iter().map(participant_view).collect(),
        all_ready: room.all_ready(),
        current_match_id: room.current_match_id.clone(),
    }
}

/// One-based layer lookup.
pub fn layer_view(case: &PublicCase, index: u32) -> Option<LayerView> {
    let position = (index as usize).checked_sub(1)?;
    case.layers.get(position).map(|layer| LayerView {
        index,
        title: layer.title.clone(),
        content: layer.content.clone(),
    })
}

pub fn reveal(case: &PrivateCase) -> Reveal {
    Reveal {
        diagnosis: case.diagnosis.clone(),
        aliases: case.aliases.clone(),
        rationale: case.rationale.clone(),
        teaching_points: case.teaching_points.clone(),
    }
}

/// Question text and options without the correct index.
pub fn question_prompts(
    pool: &MechanismQuestionPool,
    question_ids: &[String],
) -> Vec<MechanismQuestionPrompt> {
    question_ids
        .iter()
        .filter_map(|id| pool.find(id))
        .map(|question| MechanismQuestionPrompt {
            id: question.id.clone(),
            prompt: question.prompt.clone(),
            options: question.options.clone(),
        })
        .collect()
}

fn pending_prompt(check: &MechanismCheck, case: Option<&StoredCase>) -> Option<MechanismCheckPrompt> {
    if !check.pending {
        return None;
    }
    let questions = case
        .map(|case| question_prompts(&case.content.private.mechanism_questions, &check.question_ids))
        .unwrap_or_default();
    Some(MechanismCheckPrompt {
        deadline: check.deadline,
        questions,
    })
}

fn self_view(player: &PlayerResult, case: Option<&StoredCase>) -> SelfView {
    SelfView {
        identity: player.identity.clone(),
        display_name: player.display_name.clone(),
        team_id: player.team_id,
        layers_used: player.layers_used,
        wrong_guesses: player.wrong_guesses,
        guesses: player.guess_log.clone(),
        solved_at: player.solved_at,
        score: player.finished.then_some(player.score),
        sabotages_used: player.sabotages_used,
        mechanism_check_cast: player.mechanism_check_cast,
        lock_tax_penalty: player.lock_tax_penalty,
        finished: player.finished,
        pending_check: player
            .mechanism_check
            .as_ref()
            .and_then(|check| pending_prompt(check, case)),
    }
}

fn opponent_view(player: &PlayerResult, match_ended: bool) -> OpponentView {
    OpponentView {
        identity: player.identity.clone(),
        display_name: player.display_name.clone(),
        team_id: player.team_id,
        layers_used: player.layers_used,
        wrong_guesses: player.wrong_guesses,
        guess_count: player.guess_log.len(),
        sabotages_used: player.sabotages_used,
        finished: player.finished,
        solved: player.solved(),
        score: match_ended.then_some(player.score),
        connected: player.connected,
    }
}

/// Match snapshot for `requester`. Players see their own guesses, the layers
/// they have unlocked and, once finished, the reveal. Everyone else is
/// reduced to counters. `None` produces the public view used for fan-out.
pub fn match_view(game_match: &Match, case: Option<&StoredCase>, requester: Option<&str>) -> MatchView {
    let ended = game_match.status == MatchStatus::Ended;
    let me = requester.and_then(|identity| game_match.player(identity));
    let playing = game_match.status >= MatchStatus::Active;

    let layers = match (me, case) {
        (Some(player), Some(case)) if playing => {
            let visible = if player.finished {
                case.content.public.layers.len() as u32
            } else {
                player.layers_used
            };
            (1..=visible)
                .filter_map(|index| layer_view(&case.content.public, index))
                .collect()
        }
        _ => Vec::new(),
    };

    let reveal = match (me, case) {
        (Some(player), Some(case)) if player.finished => Some(reveal(&case.content.private)),
        _ => None,
    };

    MatchView {
        match_id: game_match.match_id.clone(),
        room_id: game_match.room_id.clone(),
        mode: game_match.mode,
        status: game_match.status,
        params: game_match.assigned_params.clone(),
        countdown_ends_at: game_match.countdown_ends_at,
        started_at: game_match.started_at,
        ended_at: game_match.ended_at,
        aborted: game_match.aborted,
        case_title: case
            .filter(|_| playing)
            .map(|case| case.content.public.title.clone()),
        layers,
        me: me.map(|player| self_view(player, case)),
        opponents: game_match
            .players
            .iter()
            .filter(|player| Some(player.identity.as_str()) != requester)
            .map(|player| opponent_view(player, ended))
            .collect(),
        sabotage_events: game_match.sabotage_events.clone(),
        reveal,
        rating_changes: game_match.rating_changes.clone().filter(|_| ended),
        breakdown: game_match.breakdown.clone().filter(|_| ended),
    }
}

pub fn queue_view(entry: &RankedQueueEntry, session_token: Option<String>) -> QueueView {
    QueueView {
        status: entry.status,
        alias: entry.alias.clone(),
        rating: entry.rating,
        tier: Tier::from_rating(entry.rating),
        match_id: entry.match_id.clone(),
        session_token,
    }
}

pub fn leaderboard(profiles: &[RankedProfile]) -> Vec<LeaderboardEntry> {
    profiles
        .iter()
        .enumerate()
        .map(|(i, profile)| LeaderboardEntry {
            rank: i as u32 + 1,
            alias: profile.alias.clone(),
            rating: profile.rating,
            tier: profile.tier,
            wins: profile.wins,
            losses: profile.losses,
            draws: profile.draws,
            best_streak: profile.best_streak,
        })
        .collect()
}
