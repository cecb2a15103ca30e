//! Fixed game rules shared by every service.

/// Number of case layers a player can unlock, including the first one.
pub const MAX_LAYERS: u32 = 6;

/// Score assigned to a player who exhausts every layer without solving.
pub const MAX_PENALTY_SCORE: i64 = 9999;

/// Plain sabotage casts allowed per player per match.
pub const MAX_SABOTAGES_PER_PLAYER: u32 = 2;

/// Questions drawn for a single mechanism check.
pub const MECHANISM_CHECK_QUESTIONS: usize = 2;

/// Correct answers needed to pass a mechanism check.
pub const MECHANISM_CHECK_PASS_THRESHOLD: usize = 2;

pub const MECHANISM_CHECK_WINDOW_MS: i64 = 12_000;

/// Wrong guesses added when a mechanism check is failed or missed.
pub const MECHANISM_CHECK_PENALTY: u32 = 1;

/// Lock tax units added each time an armed lock tax fires.
pub const LOCK_TAX_UNITS: u32 = 1;

pub const FOG_OF_WAR_MS: i64 = 5_000;
pub const JAMMED_SUBMIT_MS: i64 = 3_000;

/// Delay between a successful case generation and the first accepted guess.
pub const COUNTDOWN_MS: i64 = 5_000;

pub const ROOM_TTL_SECS: i64 = 24 * 60 * 60;
pub const QUEUE_TTL_SECS: i64 = 15 * 60;
pub const CASE_TTL_SECS: i64 = 7 * 24 * 60 * 60;

pub const ROOM_KEY_LENGTH: usize = 6;
pub const ROOM_KEY_ATTEMPTS: u32 = 5;
/// Unambiguous upper-case alphabet for room codes (no 0/O, 1/I).
pub const ROOM_KEY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const MAX_TEAM_SIZE: u32 = 4;

pub const DEFAULT_RATING: i32 = 1200;
pub const ELO_K_FACTOR: f64 = 24.0;
/// Rating gap above which ranked generation is pushed one difficulty band up.
pub const RATING_GAP_BOOST: i32 = 250;
/// Rated match ids a profile remembers. A resolution recovered after this
/// many newer rated matches would be applied again.
pub const RATED_MATCH_MEMORY: usize = 200;

pub const SESSION_TOKEN_BYTES: usize = 32;

/// Read-modify-write attempts before a contended update gives up.
pub const MAX_UPDATE_ATTEMPTS: u32 = 8;

pub const MAX_GUESS_LENGTH: usize = 200;
pub const DEFAULT_LEADERBOARD_SIZE: usize = 50;
pub const MAX_HISTORY_ENTRIES: usize = 25;
