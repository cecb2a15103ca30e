use serde::{Deserialize, Serialize};

use crate::constants::MAX_GUESS_LENGTH;
use crate::models::game_match::SabotageType;
use crate::models::room::RoomSettings;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub settings: Option<RoomSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JoinRoomRequest {
    pub room_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuessRequest {
    pub guess: String,
}

impl GuessRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.guess.trim().is_empty() {
            return Err("Guess cannot be empty".to_string());
        }
        if self.guess.chars().count() > MAX_GUESS_LENGTH {
            return Err(format!(
                "Guess cannot exceed {} characters",
                MAX_GUESS_LENGTH
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SabotageRequest {
    pub target_identity: String,
    pub sabotage_type: SabotageType,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MechanismCastRequest {
    pub target_identity: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MechanismAnswer {
    pub question_id: String,
    pub choice: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MechanismAnswerRequest {
    pub answers: Vec<MechanismAnswer>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionQuery {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_validation() {
        let ok = GuessRequest {
            guess: "heart attack".to_string(),
        };
        assert!(ok.validate().is_ok());

        let blank = GuessRequest {
            guess: "   ".to_string(),
        };
        assert!(blank.validate().is_err());

        let long = GuessRequest {
            guess: "x".repeat(MAX_GUESS_LENGTH + 1),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_sabotage_request_deserializes_snake_case_type() {
        let request: SabotageRequest = serde_json::from_str(
            r#"{"target_identity":"bob","sabotage_type":"jammed_submit"}"#,
        )
        .unwrap();
        assert_eq!(request.sabotage_type, SabotageType::JammedSubmit);
    }
}
