//! Score formulas and the end-of-match breakdown. Lower scores win.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::constants::MAX_PENALTY_SCORE;
use crate::models::game_match::{BreakdownLine, Match, MatchBreakdown, PlayerResult, TeamTotal};
use crate::models::room::ScoringMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreInputs {
    pub layers_used: u32,
    pub wrong_guesses: u32,
    pub solve_ms: i64,
    pub lock_tax_penalty: u32,
}

impl ScoreInputs {
    fn solve_seconds(&self) -> f64 {
        self.solve_ms.max(0) as f64 / 1000.0
    }
}

impl ScoringMode {
    pub fn score(&self, inputs: &ScoreInputs) -> i64 {
        let layers = inputs.layers_used as i64;
        let wrong = inputs.wrong_guesses as i64;
        let lock_tax = inputs.lock_tax_penalty as i64;
        match self {
            ScoringMode::Race => {
                inputs.solve_seconds().round() as i64 + 10 * wrong + 5 * (layers - 1) + lock_tax
            }
            ScoringMode::Efficiency => 10 * layers + 5 * wrong + lock_tax,
            ScoringMode::Hybrid => {
                8 * layers + 6 * wrong + (inputs.solve_seconds() / 2.0).floor() as i64 + lock_tax
            }
        }
    }

    /// The formula with this player's numbers filled in.
    pub fn describe(&self, inputs: &ScoreInputs) -> String {
        let seconds = inputs.solve_seconds();
        match self {
            ScoringMode::Race => format!(
                "{}s + {} wrong x 10 + {} extra layers x 5 + {} lock tax",
                seconds.round() as i64,
                inputs.wrong_guesses,
                inputs.layers_used.saturating_sub(1),
                inputs.lock_tax_penalty
            ),
            ScoringMode::Efficiency => format!(
                "{} layers x 10 + {} wrong x 5 + {} lock tax",
                inputs.layers_used, inputs.wrong_guesses, inputs.lock_tax_penalty
            ),
            ScoringMode::Hybrid => format!(
                "{} layers x 8 + {} wrong x 6 + {}s / 2 + {} lock tax",
                inputs.layers_used,
                inputs.wrong_guesses,
                seconds.floor() as i64,
                inputs.lock_tax_penalty
            ),
        }
    }
}

/// Finished players by score, earlier solve breaking ties; unsolved and
/// unfinished players trail.
pub fn compare_results(a: &PlayerResult, b: &PlayerResult) -> Ordering {
    b.finished
        .cmp(&a.finished)
        .then(a.score.cmp(&b.score))
        .then(match (a.solved_at, b.solved_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

pub fn build_breakdown(game_match: &Match) -> MatchBreakdown {
    let mut ranked: Vec<&PlayerResult> = game_match.players.iter().collect();
    ranked.sort_by(|a, b| compare_results(a, b));

    let lines: Vec<BreakdownLine> = ranked
        .iter()
        .enumerate()
        .map(|(i, player)| {
            let solve_ms = player.solved_at.map(|at| game_match.elapsed_ms(at));
            let detail = match solve_ms {
                Some(ms) => game_match.scoring_mode.describe(&ScoreInputs {
                    layers_used: player.layers_used,
                    wrong_guesses: player.wrong_guesses,
                    solve_ms: ms,
                    lock_tax_penalty: player.lock_tax_penalty,
                }),
                None if player.finished => {
                    format!("all layers used without a diagnosis: {}", MAX_PENALTY_SCORE)
                }
                None => "did not finish".to_string(),
            };
            BreakdownLine {
                rank: i as u32 + 1,
                identity: player.identity.clone(),
                display_name: player.display_name.clone(),
                team_id: player.team_id,
                score: player.score,
                solved: player.solved(),
                layers_used: player.layers_used,
                wrong_guesses: player.wrong_guesses,
                lock_tax_penalty: player.lock_tax_penalty,
                solve_ms,
                detail,
            }
        })
        .collect();

    let mut team_scores: BTreeMap<u8, i64> = BTreeMap::new();
    for player in &game_match.players {
        if let Some(team_id) = player.team_id {
            *team_scores.entry(team_id).or_insert(0) += player.score;
        }
    }
    let mut teams: Vec<TeamTotal> = team_scores
        .into_iter()
        .map(|(team_id, score)| TeamTotal {
            rank: 0,
            team_id,
            score,
        })
        .collect();
    teams.sort_by(|a, b| a.score.cmp(&b.score).then(a.team_id.cmp(&b.team_id)));
    for (i, team) in teams.iter_mut().enumerate() {
        team.rank = i as u32 + 1;
    }

    let winner = ranked
        .first()
        .filter(|player| player.solved())
        .map(|player| player.identity.clone());

    MatchBreakdown {
        winner,
        lines,
        teams,
        timeline: game_match.timeline.clone(),
    }
}
