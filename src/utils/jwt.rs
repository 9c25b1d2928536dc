use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Bearer token claims. Tokens are minted by the identity provider in front
/// of this service; `mailflow token` mints them for development.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// User id
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: Option<String>, expiration_hours: i64) -> Self {
        let now = jiff::Timestamp::now().as_second();
        Self {
            sub: user_id.to_string(),
            email,
            iat: now,
            exp: now + expiration_hours * 3600,
        }
    }

    pub fn user_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Unauthorized {
            message: "Token subject is not a user id".to_string(),
        })
    }
}

pub fn generate_token(
    user_id: Uuid,
    email: Option<String>,
    secret: &str,
    expiration_hours: i64,
) -> AppResult<String> {
    let claims = Claims::new(user_id, email, expiration_hours);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal {
        source: anyhow::anyhow!("Failed to generate JWT token: {}", e),
    })
}

/// Verifies signature and expiry and returns the claims.
pub fn validate_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthorized {
            message: "Token has expired".to_string(),
        },
        jsonwebtoken::errors::ErrorKind::InvalidToken => AppError::Unauthorized {
            message: "Invalid token".to_string(),
        },
        jsonwebtoken::errors::ErrorKind::InvalidSignature => AppError::Unauthorized {
            message: "Invalid token signature".to_string(),
        },
        _ => AppError::Unauthorized {
            message: format!("Token validation failed: {}", e),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test_secret_key_for_jwt_testing";

    #[test]
    fn token_round_trips_user_id() {
        let user = Uuid::new_v4();
        let token = generate_token(user, Some("ann@example.com".into()), TEST_SECRET, 1).unwrap();
        assert_eq!(token.matches('.').count(), 2);

        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.user_id().unwrap(), user);
        assert_eq!(claims.email.as_deref(), Some("ann@example.com"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_token(Uuid::new_v4(), None, TEST_SECRET, 1).unwrap();
        match validate_token(&token, "another_secret") {
            Err(AppError::Unauthorized { message }) => assert!(message.contains("signature")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60s leeway
        let token = generate_token(Uuid::new_v4(), None, TEST_SECRET, -1).unwrap();
        match validate_token(&token, TEST_SECRET) {
            Err(AppError::Unauthorized { message }) => assert!(message.contains("expired")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            validate_token("invalid.token.format", TEST_SECRET),
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[test]
    fn non_uuid_subject_is_unauthorized() {
        let claims = Claims {
            sub: "42".to_string(),
            email: None,
            iat: 0,
            exp: 0,
        };
        assert!(matches!(claims.user_id(), Err(AppError::Unauthorized { .. })));
    }
}
