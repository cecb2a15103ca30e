//! Per-player session tokens, used to tell a reconnect from a second tab.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::constants::SESSION_TOKEN_BYTES;
use crate::services::errors::GameError;

/// Opaque token with `SESSION_TOKEN_BYTES` of OS entropy, hex encoded.
pub fn issue_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Comparison whose running time does not depend on where the inputs differ.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// A presented token must equal the stored one. Absent tokens are fresh
/// joins and are checked by the caller's membership rules instead.
pub fn verify_token(stored: &str, presented: Option<&str>) -> Result<(), GameError> {
    match presented {
        None => Ok(()),
        Some(token) if constant_time_eq(stored, token) => Ok(()),
        Some(_) => Err(GameError::SessionMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tokens_carry_enough_entropy() {
        let token = issue_token();
        assert_eq!(token.len(), SESSION_TOKEN_BYTES * 2);
        assert!(SESSION_TOKEN_BYTES >= 24);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..200).map(|_| issue_token()).collect();
        assert_eq!(tokens.len(), 200);
    }

    #[test]
    fn test_verify_token() {
        let token = issue_token();
        assert!(verify_token(&token, Some(&token)).is_ok());
        assert!(verify_token(&token, None).is_ok());
        assert_eq!(
            verify_token(&token, Some("forged")),
            Err(GameError::SessionMismatch)
        );
        assert_eq!(
            verify_token(&token, Some(&issue_token())),
            Err(GameError::SessionMismatch)
        );
    }
}
