use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_RATING, QUEUE_TTL_SECS, RATED_MATCH_MEMORY};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Diamond,
    Master,
}

impl Tier {
    pub fn from_rating(rating: i32) -> Self {
        match rating {
            r if r < 1200 => Tier::Bronze,
            r if r < 1500 => Tier::Silver,
            r if r < 1800 => Tier::Gold,
            r if r < 2100 => Tier::Diamond,
            _ => Tier::Master,
        }
    }
}

const ALIAS_PREFIXES: [&str; 6] = ["Intern", "Resident", "Fellow", "Registrar", "Consultant", "Attending"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedProfile {
    pub identity: String,
    /// Anonymized handle shown on leaderboards and to ranked opponents.
    pub alias: String,
    pub rating: i32,
    pub tier: Tier,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    /// Matches already applied to this profile, oldest first.
    #[serde(default)]
    pub rated_match_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl RankedProfile {
    pub fn new(identity: &str, now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let prefix = ALIAS_PREFIXES[rng.gen_range(0..ALIAS_PREFIXES.len())];
        let alias = format!("{}-{:04}", prefix, rng.gen_range(0..10_000));
        RankedProfile {
            identity: identity.to_string(),
            alias,
            rating: DEFAULT_RATING,
            tier: Tier::from_rating(DEFAULT_RATING),
            wins: 0,
            losses: 0,
            draws: 0,
            current_streak: 0,
            best_streak: 0,
            rated_match_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn has_rated(&self, match_id: &str) -> bool {
        self.rated_match_ids.iter().any(|id| id == match_id)
    }

    pub fn remember_rated(&mut self, match_id: &str) {
        self.rated_match_ids.push(match_id.to_string());
        if self.rated_match_ids.len() > RATED_MATCH_MEMORY {
            let excess = self.rated_match_ids.len() - RATED_MATCH_MEMORY;
            self.rated_match_ids.drain(..excess);
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    Matched,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedQueueEntry {
    pub identity: String,
    pub alias: String,
    /// Rating snapshot taken at join time.
    pub rating: i32,
    pub status: QueueStatus,
    pub match_id: Option<String>,
    pub joined_at: DateTime<Utc>,
    /// Epoch seconds, DynamoDB TTL attribute.
    pub expires_at: i64,
    pub version: u64,
}

impl RankedQueueEntry {
    pub fn new(profile: &RankedProfile, now: DateTime<Utc>) -> Self {
        RankedQueueEntry {
            identity: profile.identity.clone(),
            alias: profile.alias.clone(),
            rating: profile.rating,
            status: QueueStatus::Waiting,
            match_id: None,
            joined_at: now,
            expires_at: now.timestamp() + QUEUE_TTL_SECS,
            version: 0,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.expires_at
    }

    pub fn is_waiting(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueStatus::Waiting && !self.is_stale(now)
    }
}
