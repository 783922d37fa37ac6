//! JWT access-token issuance/validation and refresh-token generation.
//!
//! Access tokens are HS256-signed JWTs carrying a [`Claims`] payload and are
//! never persisted. Refresh tokens are opaque random strings; the session
//! store keeps them as session ids.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use listkeep_core::error::CoreError;
use listkeep_core::types::DbId;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Default access token lifetime in minutes (12 hours).
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 12 * 60;

/// Random bytes in a refresh token before hex encoding.
const REFRESH_TOKEN_BYTES: usize = 32;

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: DbId,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 720).
    pub access_token_expiry_mins: i64,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS` | no       | `720`   |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");

        Self {
            secret,
            access_token_expiry_mins,
        }
    }

    /// Access token lifetime in seconds.
    pub fn access_token_expiry_secs(&self) -> i64 {
        self.access_token_expiry_mins * 60
    }
}

/// Signs and verifies access tokens with one shared secret.
///
/// Pure computation: no I/O, safe to call on every request.
#[derive(Clone)]
pub struct TokenIssuer {
    config: JwtConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: JwtConfig) -> Self {
        let encoding = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            config,
            encoding,
            decoding,
            validation,
        }
    }

    /// Issue an access token for `user_id`, valid from now for the
    /// configured lifetime.
    pub fn issue(&self, user_id: DbId) -> Result<String, CoreError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            user_id,
            iat: now,
            exp: now + self.config.access_token_expiry_secs(),
        };
        self.sign(&claims)
    }

    /// Sign arbitrary claims. Exposed for tests that need back-dated tokens.
    pub fn sign(&self, claims: &Claims) -> Result<String, CoreError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| CoreError::Internal(format!("Token generation error: {e}")))
    }

    /// Verify a token and return the user it was issued for.
    ///
    /// The signature is checked first; any failure there (or a malformed
    /// token) is [`CoreError::InvalidTokenSignature`]. A correctly signed
    /// token past its `exp` is [`CoreError::TokenExpired`].
    pub fn parse(&self, token: &str) -> Result<DbId, CoreError> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims.user_id),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(CoreError::TokenExpired),
                _ => Err(CoreError::InvalidTokenSignature),
            },
        }
    }
}

/// Generate a cryptographically random refresh token (64 hex characters).
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    /// Helper to build a test issuer with a known secret.
    fn test_issuer() -> TokenIssuer {
        TokenIssuer::new(JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 720,
        })
    }

    #[test]
    fn test_issue_and_parse_access_token() {
        let issuer = test_issuer();
        let token = issuer.issue(42).expect("token generation should succeed");
        assert_eq!(issuer.parse(&token).unwrap(), 42);
    }

    #[test]
    fn test_claims_carry_twelve_hour_window() {
        let issuer = test_issuer();
        let token = issuer.issue(1).unwrap();

        let data = decode::<Claims>(&token, &issuer.decoding, &issuer.validation).unwrap();
        assert_eq!(data.claims.exp - data.claims.iat, 12 * 60 * 60);
    }

    #[test]
    fn test_expired_token_reports_expired() {
        let issuer = test_issuer();
        let now = chrono::Utc::now().timestamp();
        let token = issuer
            .sign(&Claims {
                user_id: 1,
                iat: now - 600,
                exp: now - 10,
            })
            .unwrap();

        assert_matches!(issuer.parse(&token), Err(CoreError::TokenExpired));
    }

    #[test]
    fn test_negative_lifetime_issues_expired_tokens() {
        let issuer = TokenIssuer::new(JwtConfig {
            secret: "s".to_string(),
            access_token_expiry_mins: -1,
        });
        let token = issuer.issue(5).unwrap();
        assert_matches!(issuer.parse(&token), Err(CoreError::TokenExpired));
    }

    #[test]
    fn test_different_secrets_fail() {
        let token = TokenIssuer::new(JwtConfig {
            secret: "secret-alpha".to_string(),
            access_token_expiry_mins: 15,
        })
        .issue(1)
        .unwrap();

        let other = TokenIssuer::new(JwtConfig {
            secret: "secret-bravo".to_string(),
            access_token_expiry_mins: 15,
        });
        assert_matches!(other.parse(&token), Err(CoreError::InvalidTokenSignature));
    }

    #[test]
    fn test_any_mutated_byte_invalidates_signature() {
        let issuer = test_issuer();
        let token = issuer.issue(7).unwrap();
        let positions = [0, token.len() / 3, token.len() / 2, token.len() - 2, token.len() - 1];

        for pos in positions {
            let mut bytes = token.clone().into_bytes();
            bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };
            let mutated = String::from_utf8(bytes).unwrap();
            assert_matches!(
                issuer.parse(&mutated),
                Err(CoreError::InvalidTokenSignature),
                "mutation at byte {pos} must be rejected"
            );
        }
    }

    #[test]
    fn test_expired_token_with_bad_signature_is_a_signature_error() {
        let now = chrono::Utc::now().timestamp();
        let token = TokenIssuer::new(JwtConfig {
            secret: "someone-else".to_string(),
            access_token_expiry_mins: 15,
        })
        .sign(&Claims {
            user_id: 1,
            iat: now - 600,
            exp: now - 300,
        })
        .unwrap();

        assert_matches!(
            test_issuer().parse(&token),
            Err(CoreError::InvalidTokenSignature)
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_matches!(
            test_issuer().parse("not.a.jwt"),
            Err(CoreError::InvalidTokenSignature)
        );
    }

    #[test]
    fn test_refresh_tokens_are_random_hex() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_eq!(a.len(), REFRESH_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
