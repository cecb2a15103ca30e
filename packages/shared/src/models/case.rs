use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::CASE_TTL_SECS;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    /// One band harder, saturating at `Expert`.
    pub fn boosted(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard | Difficulty::Expert => Difficulty::Expert,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseStyle {
    Classic,
    Emergency,
    Outpatient,
    Pediatric,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimelineMode {
    Acute,
    Subacute,
    Chronic,
}

/// Parameters handed to the case generator. Frozen onto the match once
/// generation is requested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    pub difficulty: Difficulty,
    pub style: CaseStyle,
    /// Irrelevant findings sprinkled into layers, 0 to 3.
    pub noise: u8,
    pub red_herrings: u8,
    pub timeline: TimelineMode,
    /// Forward-compatible generator hints the engine passes through untouched.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            difficulty: Difficulty::Medium,
            style: CaseStyle::Classic,
            noise: 1,
            red_herrings: 1,
            timeline: TimelineMode::Acute,
            extra: BTreeMap::new(),
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.noise > 3 {
            return Err("noise must be between 0 and 3".to_string());
        }
        if self.red_herrings > 3 {
            return Err("red_herrings must be between 0 and 3".to_string());
        }
        if self.extra.len() > 16 {
            return Err("too many extra generation parameters".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseLayer {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicCase {
    pub title: String,
    pub layers: Vec<CaseLayer>,
}

/// Extra constraints on what counts as a correct answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AcceptRules {
    /// Every token must appear in the normalized guess.
    #[serde(default)]
    pub require_all: Vec<String>,
    /// No token may appear in the normalized guess.
    #[serde(default)]
    pub forbid_any: Vec<String>,
    /// When non-empty, short alias hits are only accepted if listed here.
    #[serde(default)]
    pub allowed_abbreviations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MechanismQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MechanismQuestionPool {
    #[serde(default)]
    pub step_chain: Vec<MechanismQuestion>,
    #[serde(default)]
    pub compensation: Vec<MechanismQuestion>,
}

impl MechanismQuestionPool {
    pub fn all(&self) -> impl Iterator<Item = &MechanismQuestion> {
        self.step_chain.iter().chain(self.compensation.iter())
    }

    pub fn find(&self, question_id: &str) -> Option<&MechanismQuestion> {
        self.all().find(|question| question.id == question_id)
    }

    pub fn len(&self) -> usize {
        self.step_chain.len() + self.compensation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivateCase {
    pub diagnosis: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub accept_rules: Option<AcceptRules>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub teaching_points: Vec<String>,
    #[serde(default)]
    pub mechanism_questions: MechanismQuestionPool,
}

/// Generator output: what players may see, and what only finishers may see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseContent {
    pub public: PublicCase,
    pub private: PrivateCase,
}

impl CaseContent {
    pub fn validate(&self) -> Result<(), String> {
        if self.public.layers.is_empty() {
            return Err("case has no layers".to_string());
        }
        if self.private.diagnosis.trim().is_empty() {
            return Err("case has no diagnosis".to_string());
        }
        if let Some(question) = self
            .private
            .mechanism_questions
            .all()
            .find(|question| question.correct_index >= question.options.len())
        {
            return Err(format!(
                "mechanism question {} has an out of range answer",
                question.id
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCase {
    pub case_id: String,
    pub content: CaseContent,
    pub created_at: DateTime<Utc>,
    /// Epoch seconds, DynamoDB TTL attribute.
    pub expires_at: i64,
}

impl StoredCase {
    pub fn new(content: CaseContent, now: DateTime<Utc>) -> Self {
        StoredCase {
            case_id: Uuid::new_v4().to_string(),
            content,
            created_at: now,
            expires_at: now.timestamp() + CASE_TTL_SECS,
        }
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    fn question(id: &str, correct_index: usize) -> MechanismQuestion {
        MechanismQuestion {
            id: id.to_string(),
            prompt: format!("Prompt for {}", id),
            options: vec![
                "option a".to_string(),
                "option b".to_string(),
                "option c".to_string(),
            ],
            correct_index,
        }
    }

    /// Myocardial infarction case used across service tests.
    pub fn mi_case() -> CaseContent {
        CaseContent {
            public: PublicCase {
                title: "Chest pain at the bus stop".to_string(),
                layers: (1..=6)
                    .map(|i| CaseLayer {
                        title: format!("Layer {}", i),
                        content: format!("Findings {}", i),
                    })
                    .collect(),
            },
            private: PrivateCase {
                diagnosis: "Myocardial Infarction".to_string(),
                aliases: vec![
                    "MI".to_string(),
                    "heart attack".to_string(),
                    "stemi".to_string(),
                    "nstemi".to_string(),
                ],
                accept_rules: None,
                rationale: "Troponin rise with ST changes".to_string(),
                teaching_points: vec!["Time is myocardium".to_string()],
                mechanism_questions: MechanismQuestionPool {
                    step_chain: vec![question("sc-1", 0), question("sc-2", 1)],
                    compensation: vec![question("cp-1", 2)],
                },
            },
        }
    }
}
