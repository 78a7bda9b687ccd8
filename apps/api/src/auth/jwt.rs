use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOKEN_TTL_HOURS: i64 = 24;
const STATE_TTL_MINUTES: i64 = 10;

/// Bearer token claims (HS256 over `{user_id, username}`).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: String,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

/// Claims carried in the OAuth `state` parameter of the design-tool connect flow.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OAuthStateClaims {
    pub user_id: String,
    pub return_to: Option<String>,
    /// Row id of the stored PKCE verifier.
    pub state_id: Uuid,
    pub exp: i64,
}

/// Creates and verifies HS256 tokens with a single shared secret.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Token expires after 24 hours. Issuing lives outside this service;
    /// tests mint tokens with it.
    #[allow(dead_code)]
    pub fn create_token(&self, user_id: &str, username: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(Into::into)
    }

    pub fn sign_state(
        &self,
        user_id: &str,
        return_to: Option<String>,
        state_id: Uuid,
    ) -> Result<String> {
        let claims = OAuthStateClaims {
            user_id: user_id.to_string(),
            return_to,
            state_id,
            exp: (Utc::now() + Duration::minutes(STATE_TTL_MINUTES)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    pub fn verify_state(&self, state: &str) -> Result<OAuthStateClaims> {
        decode::<OAuthStateClaims>(state, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_verify_token() {
        let service = JwtService::new("test_secret_key");
        let token = service.create_token("u-42", "dana").unwrap();
        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.user_id, "u-42");
        assert_eq!(claims.sub, "u-42");
        assert_eq!(claims.username, "dana");
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = JwtService::new("test_secret_key");
        let claims = Claims {
            sub: "u".to_string(),
            user_id: "u".to_string(),
            username: "u".to_string(),
            exp: (Utc::now() - Duration::hours(2)).timestamp(),
            iat: (Utc::now() - Duration::hours(3)).timestamp(),
        };
        let token = encode(&Header::default(), &claims, &service.encoding_key).unwrap();
        assert!(service.verify_token(&token).is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let service = JwtService::new("test_secret_key");
        let state_id = Uuid::new_v4();
        let state = service
            .sign_state("u-7", Some("/proposals/1".to_string()), state_id)
            .unwrap();
        let claims = service.verify_state(&state).unwrap();
        assert_eq!(claims.user_id, "u-7");
        assert_eq!(claims.return_to.as_deref(), Some("/proposals/1"));
        assert_eq!(claims.state_id, state_id);
    }

    #[test]
    fn test_bearer_token_is_not_a_valid_state() {
        let service = JwtService::new("test_secret_key");
        let token = service.create_token("u-1", "eve").unwrap();
        assert!(service.verify_state(&token).is_err());
    }
}
