//! HS256 access tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use custodia_core::UserId;

use crate::{JwtClaims, Role, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed or badly signed token: {0}")]
    Malformed(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

/// Verifies bearer tokens. The API middleware only depends on this trait.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// Shared-secret HS256 signer/verifier.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `sub`, valid from `now` for the configured TTL.
    pub fn issue(
        &self,
        sub: UserId,
        username: &str,
        roles: Vec<Role>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = JwtClaims::new(sub, username, roles, now, now + self.ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        // Time-window checks run against the caller's clock in `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<JwtClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates() {
        let jwt = Hs256Jwt::new(b"secret", Duration::minutes(30));
        let now = Utc::now();
        let sub = UserId::new();
        let token = jwt.issue(sub, "lucia", vec![Role::LIBRARIAN], now).unwrap();

        let claims = jwt.validate(&token, now).unwrap();
        assert_eq!(claims.sub, sub);
        assert_eq!(claims.username, "lucia");
        assert_eq!(claims.roles, vec![Role::LIBRARIAN]);
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let now = Utc::now();
        let token = Hs256Jwt::new(b"one", Duration::minutes(5))
            .issue(UserId::new(), "x", vec![], now)
            .unwrap();
        let err = Hs256Jwt::new(b"two", Duration::minutes(5))
            .validate(&token, now)
            .unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = Hs256Jwt::new(b"secret", Duration::minutes(5));
        let issued = Utc::now() - Duration::hours(1);
        let token = jwt.issue(UserId::new(), "x", vec![], issued).unwrap();
        let err = jwt.validate(&token, Utc::now()).unwrap_err();
        assert!(matches!(err, TokenError::Claims(TokenValidationError::Expired)));
    }
}
