use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{COUNTDOWN_MS, FOG_OF_WAR_MS, JAMMED_SUBMIT_MS};
use crate::models::case::GenerationParams;
use crate::models::room::{Room, SabotagePolicy, ScoringMode};

/// Match lifecycle, ordered like `RoomStatus`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Generating,
    Countdown,
    Active,
    Resolution,
    Ended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Queue-paired, rated.
    Ranked,
    /// Room-hosted party game, unrated.
    Casual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SabotageType {
    FogOfWar,
    JammedSubmit,
    SwapFocus,
    LockTax,
    MechanismCheck,
}

impl SabotageType {
    /// Effect length in milliseconds. Zero means the effect is resolved by
    /// scoring or the client rather than a timer.
    pub fn duration_ms(&self) -> i64 {
        match self {
            SabotageType::FogOfWar => FOG_OF_WAR_MS,
            SabotageType::JammedSubmit => JAMMED_SUBMIT_MS,
            SabotageType::SwapFocus | SabotageType::LockTax | SabotageType::MechanismCheck => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SabotageType::FogOfWar => "fog_of_war",
            SabotageType::JammedSubmit => "jammed_submit",
            SabotageType::SwapFocus => "swap_focus",
            SabotageType::LockTax => "lock_tax",
            SabotageType::MechanismCheck => "mechanism_check",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SabotageEvent {
    #[serde(rename = "type")]
    pub sabotage_type: SabotageType,
    pub from_identity: String,
    pub to_identity: String,
    pub fired_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MechanismOutcome {
    pub passed: bool,
    pub timed_out: bool,
    pub correct_count: usize,
    pub resolved_at: DateTime<Utc>,
}

/// Pending anti-cheat challenge held against its target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MechanismCheck {
    pub pending: bool,
    pub caster_identity: String,
    pub issued_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub question_ids: Vec<String>,
    pub outcome: Option<MechanismOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuessEntry {
    pub text: String,
    pub correct: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerResult {
    pub identity: String,
    pub display_name: String,
    pub team_id: Option<u8>,
    pub layers_used: u32,
    pub wrong_guesses: u32,
    pub guess_log: Vec<GuessEntry>,
    pub solved_at: Option<DateTime<Utc>>,
    pub score: i64,
    pub sabotages_used: u32,
    pub finished: bool,
    pub connected: bool,
    pub session_token: String,
    pub mechanism_check: Option<MechanismCheck>,
    /// Set once this player has cast their single mechanism check.
    #[serde(default)]
    pub mechanism_check_cast: bool,
    /// Lock tax charges waiting for the next layer unlock.
    #[serde(default)]
    pub lock_tax_armed: u32,
    #[serde(default)]
    pub lock_tax_penalty: u32,
    /// Rating snapshot taken when a ranked match was paired.
    #[serde(default)]
    pub rating_before: Option<i32>,
}

impl PlayerResult {
    pub fn new(identity: &str, display_name: &str, team_id: Option<u8>, session_token: &str) -> Self {
        PlayerResult {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            team_id,
            layers_used: 1,
            wrong_guesses: 0,
            guess_log: Vec::new(),
            solved_at: None,
            score: 0,
            sabotages_used: 0,
            finished: false,
            connected: true,
            session_token: session_token.to_string(),
            mechanism_check: None,
            mechanism_check_cast: false,
            lock_tax_armed: 0,
            lock_tax_penalty: 0,
            rating_before: None,
        }
    }

    pub fn solved(&self) -> bool {
        self.solved_at.is_some()
    }

    pub fn has_pending_check(&self) -> bool {
        self.mechanism_check.as_ref().is_some_and(|check| check.pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RatedResult {
    Win,
    Loss,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingChange {
    pub identity: String,
    pub result: RatedResult,
    pub old_rating: i32,
    pub new_rating: i32,
    pub delta: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub at: DateTime<Utc>,
    pub identity: String,
    pub event: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakdownLine {
    pub rank: u32,
    pub identity: String,
    pub display_name: String,
    pub team_id: Option<u8>,
    pub score: i64,
    pub solved: bool,
    pub layers_used: u32,
    pub wrong_guesses: u32,
    pub lock_tax_penalty: u32,
    pub solve_ms: Option<i64>,
    /// Human-readable formula, e.g. "45s + 2 wrong x 10 + ...".
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamTotal {
    pub rank: u32,
    pub team_id: u8,
    pub score: i64,
}

/// Frozen, auditable result written once the match ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchBreakdown {
    pub winner: Option<String>,
    pub lines: Vec<BreakdownLine>,
    pub teams: Vec<TeamTotal>,
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub room_id: Option<String>,
    pub mode: MatchMode,
    pub status: MatchStatus,
    pub assigned_params: GenerationParams,
    pub scoring_mode: ScoringMode,
    pub sabotage_policy: SabotagePolicy,
    pub match_case_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub countdown_ends_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub players: Vec<PlayerResult>,
    pub sabotage_events: Vec<SabotageEvent>,
    pub timeline: Vec<TimelineEntry>,
    pub rating_changes: Option<Vec<RatingChange>>,
    pub breakdown: Option<MatchBreakdown>,
    pub generation_attempts: u32,
    pub last_generation_error: Option<String>,
    pub aborted: bool,
    pub version: u64,
}

impl Match {
    fn base(
        room_id: Option<String>,
        mode: MatchMode,
        params: GenerationParams,
        scoring_mode: ScoringMode,
        sabotage_policy: SabotagePolicy,
        players: Vec<PlayerResult>,
        now: DateTime<Utc>,
    ) -> Self {
        Match {
            match_id: Uuid::new_v4().to_string(),
            room_id,
            mode,
            status: MatchStatus::Generating,
            assigned_params: params,
            scoring_mode,
            sabotage_policy,
            match_case_id: None,
            created_at: now,
            countdown_ends_at: None,
            started_at: None,
            ended_at: None,
            players,
            sabotage_events: Vec::new(),
            timeline: Vec::new(),
            rating_changes: None,
            breakdown: None,
            generation_attempts: 0,
            last_generation_error: None,
            aborted: false,
            version: 0,
        }
    }

    /// Seats every room participant, carrying over their session tokens.
    pub fn for_room(room: &Room, now: DateTime<Utc>) -> Self {
        let players = room
            .participants
            .iter()
            .map(|p| PlayerResult::new(&p.identity, &p.display_name, p.team_id, &p.session_token))
            .collect();
        Match::base(
            Some(room.room_id.clone()),
            MatchMode::Casual,
            room.settings.generation.clone(),
            room.settings.scoring_mode,
            room.settings.sabotage.clone(),
            players,
            now,
        )
    }

    pub fn ranked(
        match_id: &str,
        players: Vec<PlayerResult>,
        params: GenerationParams,
        now: DateTime<Utc>,
    ) -> Self {
        let mut game_match = Match::base(
            None,
            MatchMode::Ranked,
            params,
            ScoringMode::Race,
            SabotagePolicy::default(),
            players,
            now,
        );
        game_match.match_id = match_id.to_string();
        game_match
    }

    pub fn player(&self, identity: &str) -> Option<&PlayerResult> {
        self.players.iter().find(|p| p.identity == identity)
    }

    pub fn player_mut(&mut self, identity: &str) -> Option<&mut PlayerResult> {
        self.players.iter_mut().find(|p| p.identity == identity)
    }

    pub fn all_finished(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.finished)
    }

    pub fn is_ranked(&self) -> bool {
        self.mode == MatchMode::Ranked
    }

    pub fn start_countdown(&mut self, case_id: &str, now: DateTime<Utc>) {
        self.match_case_id = Some(case_id.to_string());
        self.status = MatchStatus::Countdown;
        self.countdown_ends_at = Some(now + Duration::milliseconds(COUNTDOWN_MS));
        self.last_generation_error = None;
    }

    /// Lazily flips countdown to active once the countdown has elapsed.
    /// Returns true when the flip happened on this call.
    pub fn activate_if_due(&mut self, now: DateTime<Utc>) -> bool {
        match (self.status, self.countdown_ends_at) {
            (MatchStatus::Countdown, Some(ends_at)) if now >= ends_at => {
                self.status = MatchStatus::Active;
                self.started_at = Some(ends_at);
                true
            }
            _ => false,
        }
    }

    /// Milliseconds from match start to `at`, never negative.
    pub fn elapsed_ms(&self, at: DateTime<Utc>) -> i64 {
        self.started_at
            .map(|started| (at - started).num_milliseconds().max(0))
            .unwrap_or(0)
    }

    pub fn record(&mut self, at: DateTime<Utc>, identity: &str, event: impl Into<String>) {
        self.timeline.push(TimelineEntry {
            at,
            identity: identity.to_string(),
            event: event.into(),
        });
    }

    /// Identities seated in this match, for membership indexing.
    pub fn identities(&self) -> Vec<String> {
        self.players.iter().map(|p| p.identity.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::room::{Participant, RoomSettings};

    fn two_player_room() -> Room {
        let mut room = Room::new("ROOM22", "alice", RoomSettings::default(), Utc::now());
        for name in ["alice", "bob"] {
            room.participants.push(Participant {
                identity: name.to_string(),
                display_name: name.to_string(),
                team_id: None,
                ready: true,
                connected: true,
                joined_at: Utc::now(),
                session_token: format!("tok-{}", name),
            });
        }
        room
    }

    #[test]
    fn test_room_match_carries_tokens_and_settings() {
        let room = two_player_room();
        let game_match = Match::for_room(&room, Utc::now());

        assert_eq!(game_match.status, MatchStatus::Generating);
        assert_eq!(game_match.mode, MatchMode::Casual);
        assert_eq!(game_match.room_id.as_deref(), Some(room.room_id.as_str()));
        assert_eq!(game_match.players.len(), 2);
        assert_eq!(game_match.players[1].session_token, "tok-bob");
        assert!(game_match.players.iter().all(|p| p.layers_used == 1));
    }

    #[test]
    fn test_countdown_activates_lazily() {
        let now = Utc::now();
        let mut game_match = Match::for_room(&two_player_room(), now);
        game_match.start_countdown("case-1", now);

        assert!(!game_match.activate_if_due(now + Duration::milliseconds(COUNTDOWN_MS - 1)));
        assert_eq!(game_match.status, MatchStatus::Countdown);

        let later = now + Duration::milliseconds(COUNTDOWN_MS + 250);
        assert!(game_match.activate_if_due(later));
        assert_eq!(game_match.status, MatchStatus::Active);
        assert_eq!(game_match.started_at, game_match.countdown_ends_at);
        assert!(!game_match.activate_if_due(later));
    }

    #[test]
    fn test_all_finished() {
        let mut game_match = Match::for_room(&two_player_room(), Utc::now());
        assert!(!game_match.all_finished());
        game_match.players[0].finished = true;
        assert!(!game_match.all_finished());
        game_match.players[1].finished = true;
        assert!(game_match.all_finished());
    }

    #[test]
    fn test_sabotage_durations() {
        assert_eq!(SabotageType::FogOfWar.duration_ms(), 5000);
        assert_eq!(SabotageType::JammedSubmit.duration_ms(), 3000);
        assert_eq!(SabotageType::SwapFocus.duration_ms(), 0);
        assert_eq!(SabotageType::LockTax.duration_ms(), 0);
    }

    #[test]
    fn test_sabotage_event_serializes_type_field() {
        let event = SabotageEvent {
            sabotage_type: SabotageType::FogOfWar,
            from_identity: "a".to_string(),
            to_identity: "b".to_string(),
            fired_at: Utc::now(),
            duration_ms: 5000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "fog_of_war");
    }
}
