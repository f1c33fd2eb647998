use bson::oid::ObjectId;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::models::{AuthenticatedUser, Claims, Role};
use crate::error::AppError;

/// Issues and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Sign a token for the given user.
    pub fn issue(&self, user_id: &ObjectId, role: Role) -> Result<String, AppError> {
        let claims = Claims {
            user_id: user_id.to_hex(),
            role,
            exp: (Utc::now() + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a raw token and resolve the caller it was issued to.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Forbidden("Token has expired.".into()),
                _ => {
                    tracing::debug!("Token verification error: {e}");
                    AppError::Forbidden("Invalid token.".into())
                }
            },
        )?;

        let user_id = ObjectId::parse_str(&data.claims.user_id)
            .map_err(|_| AppError::Forbidden("Invalid token.".into()))?;

        Ok(AuthenticatedUser {
            user_id,
            role: data.claims.role,
        })
    }
}
