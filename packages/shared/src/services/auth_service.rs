use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::models::identity::{Identity, TokenClaims};
use crate::services::errors::AuthServiceError;

/// Verifies bearer tokens minted by the identity provider. Identities and
/// display names are taken from the claims as-is.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: &str) -> Self {
        AuthService {
            jwt_secret: jwt_secret.to_string(),
        }
    }

    /// Mints a day-long token the way the identity provider would. Test
    /// builds only; production tokens are never issued here.
    #[cfg(any(test, feature = "test-support"))]
    pub fn generate_token(&self, identity: &str, display_name: &str) -> Result<String, AuthServiceError> {
        use chrono::{Duration, Utc};
        use jsonwebtoken::{encode, EncodingKey, Header};

        let now = Utc::now();
        let claims = TokenClaims {
            sub: identity.to_string(),
            name: Some(display_name.to_string()),
            exp: (now + Duration::hours(24)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(|e| AuthServiceError::JwtError(format!("{:#?}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Identity, AuthServiceError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());
        let validation = Validation::default();

        match decode::<TokenClaims>(token, &decoding_key, &validation) {
            Ok(token_data) if token_data.claims.sub.trim().is_empty() => {
                Err(AuthServiceError::InvalidToken)
            }
            Ok(token_data) => Ok(Identity::from(token_data.claims)),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(AuthServiceError::ExpiredToken)
                }
                _ => Err(AuthServiceError::InvalidToken),
            },
        }
    }
}
