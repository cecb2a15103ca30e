//! Client-facing projections. Every view is built by a function in
//! `services::projection`; nothing here carries session tokens of other
//! players, opponents' guess text or unrevealed case content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::case::GenerationParams;
use crate::models::game_match::{
    GuessEntry, MatchBreakdown, MatchMode, MatchStatus, RatingChange, SabotageEvent,
};
use crate::models::ranked::{QueueStatus, Tier};
use crate::models::room::{RoomSettings, RoomStatus};
use crate::services::answer_matcher::MatchMethod;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantView {
    pub identity: String,
    pub display_name: String,
    pub team_id: Option<u8>,
    pub ready: bool,
    pub connected: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomView {
    pub room_id: String,
    pub room_key: String,
    pub host_identity: String,
    pub status: RoomStatus,
    pub settings: RoomSettings,
    pub capacity: usize,
    pub participants: Vec<ParticipantView>,
    pub all_ready: bool,
    pub current_match_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerView {
    pub index: u32,
    pub title: String,
    pub content: String,
}

/// Private case content, only for players who have finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reveal {
    pub diagnosis: String,
    pub aliases: Vec<String>,
    pub rationale: String,
    pub teaching_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MechanismQuestionPrompt {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MechanismCheckPrompt {
    pub deadline: DateTime<Utc>,
    pub questions: Vec<MechanismQuestionPrompt>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelfView {
    pub identity: String,
    pub display_name: String,
    pub team_id: Option<u8>,
    pub layers_used: u32,
    pub wrong_guesses: u32,
    pub guesses: Vec<GuessEntry>,
    pub solved_at: Option<DateTime<Utc>>,
    pub score: Option<i64>,
    pub sabotages_used: u32,
    pub mechanism_check_cast: bool,
    pub lock_tax_penalty: u32,
    pub finished: bool,
    pub pending_check: Option<MechanismCheckPrompt>,
}

/// What a player may know about anyone else: counters only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpponentView {
    pub identity: String,
    pub display_name: String,
    pub team_id: Option<u8>,
    pub layers_used: u32,
    pub wrong_guesses: u32,
    pub guess_count: usize,
    pub sabotages_used: u32,
    pub finished: bool,
    pub solved: bool,
    /// Only once the match has ended.
    pub score: Option<i64>,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchView {
    pub match_id: String,
    pub room_id: Option<String>,
    pub mode: MatchMode,
    pub status: MatchStatus,
    pub params: GenerationParams,
    pub countdown_ends_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub aborted: bool,
    pub case_title: Option<String>,
    pub layers: Vec<LayerView>,
    pub me: Option<SelfView>,
    pub opponents: Vec<OpponentView>,
    pub sabotage_events: Vec<SabotageEvent>,
    pub reveal: Option<Reveal>,
    pub rating_changes: Option<Vec<RatingChange>>,
    pub breakdown: Option<MatchBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuessOutcome {
    pub correct: bool,
    pub method: Option<MatchMethod>,
    pub finished: bool,
    pub layers_used: u32,
    pub wrong_guesses: u32,
    pub score: Option<i64>,
    pub new_layer: Option<LayerView>,
    pub reveal: Option<Reveal>,
    pub match_status: MatchStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MechanismCheckIssued {
    pub target_identity: String,
    pub deadline: DateTime<Utc>,
    pub questions: Vec<MechanismQuestionPrompt>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MechanismCheckResult {
    pub passed: bool,
    pub timed_out: bool,
    pub correct_count: usize,
    pub penalty_applied: bool,
    pub wrong_guesses: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinOutcome {
    pub room_id: String,
    pub room_key: String,
    pub session_token: String,
    pub rejoined: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueView {
    pub status: QueueStatus,
    pub alias: String,
    pub rating: i32,
    pub tier: Tier,
    pub match_id: Option<String>,
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub alias: String,
    pub rating: i32,
    pub tier: Tier,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub best_streak: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionSnapshot {
    ActiveMatch { game_match: MatchView },
    Room { room: RoomView },
    EndedMatch { game_match: MatchView },
    NoActiveSession,
}
