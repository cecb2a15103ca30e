use serde::{Deserialize, Serialize};

/// Caller as resolved by the identity provider. Both fields are opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub identity: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        let display_name = claims
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| claims.sub.clone());
        Identity {
            identity: claims.sub,
            display_name,
        }
    }
}
