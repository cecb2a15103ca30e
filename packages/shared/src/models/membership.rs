use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
    Room,
    Match,
}

/// Index row linking an identity to a room or match it sits in.
/// Partition key `identity`, sort key `record_key` ("room#<id>" / "match#<id>").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub identity: String,
    pub record_key: String,
    pub kind: MembershipKind,
    pub record_id: String,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(identity: &str, kind: MembershipKind, record_id: &str, now: DateTime<Utc>) -> Self {
        let prefix = match kind {
            MembershipKind::Room => "room",
            MembershipKind::Match => "match",
        };
        Membership {
            identity: identity.to_string(),
            record_key: format!("{}#{}", prefix, record_id),
            kind,
            record_id: record_id.to_string(),
            joined_at: now,
        }
    }
}
