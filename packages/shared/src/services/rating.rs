//! ELO rating updates and tier-driven generation parameters.

use crate::constants::{DEFAULT_RATING, ELO_K_FACTOR, RATING_GAP_BOOST};
use crate::models::case::{CaseStyle, Difficulty, GenerationParams, TimelineMode};
use crate::models::game_match::{Match, PlayerResult, RatedResult, RatingChange};
use crate::models::ranked::Tier;

pub fn expected_score(my_rating: i32, opponent_rating: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent_rating - my_rating) as f64 / 400.0))
}

pub fn rating_delta(my_rating: i32, opponent_rating: i32, won: bool) -> i32 {
    let actual = if won { 1.0 } else { 0.0 };
    (ELO_K_FACTOR * (actual - expected_score(my_rating, opponent_rating))).round() as i32
}

pub fn apply_delta(rating: i32, delta: i32) -> i32 {
    (rating + delta).max(0)
}

/// A player wins by solving no later than the opponent. Never solving
/// never wins.
pub fn is_win(player: &PlayerResult, opponent: &PlayerResult) -> bool {
    match (player.solved_at, opponent.solved_at) {
        (Some(mine), Some(theirs)) => mine <= theirs,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Rating changes for a finished two-player ranked match, computed from the
/// snapshots taken at pairing time.
pub fn rating_changes(game_match: &Match) -> Vec<RatingChange> {
    let [first, second] = match game_match.players.as_slice() {
        [a, b] => [a, b],
        _ => return Vec::new(),
    };

    [(first, second), (second, first)]
        .into_iter()
        .map(|(player, opponent)| {
            let old_rating = player.rating_before.unwrap_or(DEFAULT_RATING);
            let opponent_rating = opponent
                .rating_before
                .unwrap_or(DEFAULT_RATING);
            let won = is_win(player, opponent);
            let delta = rating_delta(old_rating, opponent_rating, won);
            let new_rating = apply_delta(old_rating, delta);
            RatingChange {
                identity: player.identity.clone(),
                result: if won { RatedResult::Win } else { RatedResult::Loss },
                old_rating,
                new_rating,
                delta: new_rating - old_rating,
            }
        })
        .collect()
}

/// Default case parameters for a tier.
pub fn tier_params(tier: Tier) -> GenerationParams {
    let (difficulty, noise, red_herrings, timeline) = match tier {
        Tier::Bronze => (Difficulty::Easy, 0, 0, TimelineMode::Acute),
        Tier::Silver => (Difficulty::Medium, 1, 1, TimelineMode::Acute),
        Tier::Gold => (Difficulty::Hard, 1, 1, TimelineMode::Subacute),
        Tier::Diamond => (Difficulty::Expert, 2, 2, TimelineMode::Subacute),
        Tier::Master => (Difficulty::Expert, 3, 2, TimelineMode::Chronic),
    };
    GenerationParams {
        difficulty,
        style: CaseStyle::Classic,
        noise,
        red_herrings,
        timeline,
        ..GenerationParams::default()
    }
}

/// Parameters for a ranked pair: tier of the average rating, one band harder
/// when the gap is wide.
pub fn ranked_params(rating_a: i32, rating_b: i32) -> GenerationParams {
    let average = (rating_a + rating_b) / 2;
    let mut params = tier_params(Tier::from_rating(average));
    if (rating_a - rating_b).abs() > RATING_GAP_BOOST {
        params.difficulty = params.difficulty.boosted();
    }
    params
}
