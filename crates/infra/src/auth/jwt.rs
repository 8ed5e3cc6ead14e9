use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use codeforum_core::types::UserId;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token subject is not a user id")]
    InvalidSubject,
    #[error("jwt error: {0}")]
    Jwt(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Jwt(err),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserClaims {
    #[serde(alias = "id")]
    sub: String,
    #[serde(default)]
    iat: i64,
    exp: i64,
}

/// HS256 bearer tokens whose subject is a user id.
#[derive(Clone)]
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The subject may arrive as `id`; serde resolves the alias after decoding.
        validation.set_required_spec_claims(&["exp"]);
        TokenVerifier {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, user_id: UserId, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = UserClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        let data = decode::<UserClaims>(token, &self.decoding, &self.validation)?;
        UserId::try_from(data.claims.sub.as_str()).map_err(|_| TokenError::InvalidSubject)
    }
}
