//! Access tokens
//!
//! HS256 JWTs carrying the user id in `sub` and an expiry in `exp`.

use chrono::Duration;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, DynClock};
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

/// Token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies access tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    clock: DynClock,
}

impl TokenService {
    pub fn new(config: &AuthConfig, clock: DynClock) -> Self {
        if config.uses_default_secret() {
            tracing::warn!("Using the default JWT secret; set MYBLOG_AUTH_JWT_SECRET in production");
        }
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::hours(config.token_ttl_hours),
            clock,
        }
    }

    /// Issue a token for `user_id`
    pub fn issue(&self, user_id: &str) -> AppResult<String> {
        let now = self.clock.now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to sign token: {}", e))?;
        Ok(token)
    }

    /// Verify a token and return its claims.
    ///
    /// Expiry is checked against the injected clock rather than the wall clock.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => AppError::Unauthorized("invalid token signature".into()),
                _ => AppError::Unauthorized(format!("invalid token: {}", e)),
            }
        })?;

        if data.claims.exp <= self.clock.now().timestamp() {
            return Err(AppError::Unauthorized("token expired".into()));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            token_ttl_hours: 24,
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()))
    }

    #[test]
    fn test_issue_and_verify() {
        let clock = clock();
        let service = TokenService::new(&config("secret"), clock.clone());

        let token = service.issue("user-1").unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_token_expires_after_ttl() {
        let clock = clock();
        let service = TokenService::new(&config("secret"), clock.clone());
        let token = service.issue("user-1").unwrap();

        clock.advance(Duration::hours(23));
        assert!(service.verify(&token).is_ok());

        clock.advance(Duration::hours(1));
        assert!(matches!(service.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let clock = clock();
        let issuer = TokenService::new(&config("one"), clock.clone());
        let verifier = TokenService::new(&config("two"), clock);

        let token = issuer.issue("user-1").unwrap();
        assert!(matches!(verifier.verify(&token), Err(AppError::Unauthorized(_))));
        assert!(matches!(verifier.verify("garbage"), Err(AppError::Unauthorized(_))));
    }
}
