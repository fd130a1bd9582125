//! Session token issuance and verification
//!
//! Session tokens are HS256 JWTs carrying the operator identity. The signing
//! secret is handed in at construction; nothing here reads process state.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::models::{Identity, Role};

/// Issuer claim written into and required from every session token
pub const TOKEN_ISSUER: &str = "coop-cms";

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account ID
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub display_name: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    pub iss: String,
}

impl SessionClaims {
    fn into_identity(self) -> Result<Identity, AuthError> {
        let account_id = self.sub.parse::<i64>().map_err(|_| AuthError::InvalidToken)?;
        Ok(Identity {
            account_id,
            username: self.username,
            role: self.role,
            display_name: self.display_name,
        })
    }
}

/// A freshly signed token and the instant it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies session tokens with a single HS256 secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer for the given secret and token lifetime
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[TOKEN_ISSUER]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for the identity
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Internal("token expiry out of range".to_string()))?;
        let claims = SessionClaims {
            sub: identity.account_id.to_string(),
            username: identity.username.clone(),
            role: identity.role,
            display_name: identity.display_name.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: TOKEN_ISSUER.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("token signing failed: {}", e)))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Decode and validate a token into its claims
    pub fn decode(&self, token: &str) -> Result<SessionClaims, AuthError> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                AuthError::InvalidToken
            })
    }

    /// Resolve a token to the identity it asserts
    ///
    /// Expired, tampered, malformed or foreign tokens yield `None`.
    pub fn verify(&self, token: &str) -> Option<Identity> {
        let claims = self.decode(token).ok()?;
        match claims.into_identity() {
            Ok(identity) => Some(identity),
            Err(_) => {
                tracing::debug!("Session token subject is not an account id");
                None
            }
        }
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            account_id: 42,
            username: "editor".to_string(),
            role: Role::Editor,
            display_name: "Content Editor".to_string(),
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", Duration::hours(8))
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let issuer = issuer();
        let issued = issuer.issue(&identity()).unwrap();

        let verified = issuer.verify(&issued.token).unwrap();
        assert_eq!(verified, identity());
    }

    #[test]
    fn test_expiry_is_ttl_from_now() {
        let issuer = issuer();
        let before = Utc::now();
        let issued = issuer.issue(&identity()).unwrap();

        let delta = issued.expires_at - before;
        assert!(delta <= Duration::hours(8) + Duration::seconds(1));
        assert!(delta >= Duration::hours(8) - Duration::seconds(1));

        let claims = issuer.decode(&issued.token).unwrap();
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(claims.iss, TOKEN_ISSUER);
        assert_eq!(claims.sub, "42");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let expired = TokenIssuer::new("test-secret", Duration::seconds(-30));
        let issued = expired.issue(&identity()).unwrap();

        // Signature is valid under the same secret, only the expiry fails
        assert!(issuer().verify(&issued.token).is_none());
        assert!(expired.verify(&issued.token).is_none());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issued = issuer().issue(&identity()).unwrap();
        let rotated = TokenIssuer::new("rotated-secret", Duration::hours(8));

        assert!(rotated.verify(&issued.token).is_none());
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let issuer = issuer();
        let issued = issuer.issue(&identity()).unwrap();

        let mut parts: Vec<String> = issued.token.split('.').map(String::from).collect();
        parts[1] = format!("{}x", parts[1]);
        let tampered = parts.join(".");

        assert!(issuer.verify(&tampered).is_none());
    }

    #[test]
    fn test_malformed_token_is_rejected() {
        let issuer = issuer();
        assert!(issuer.verify("").is_none());
        assert!(issuer.verify("not.a.jwt").is_none());
        assert!(matches!(
            issuer.decode("garbage"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_foreign_issuer_is_rejected() {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: "42".to_string(),
            username: "editor".to_string(),
            role: Role::Editor,
            display_name: "Editor".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            iss: "someone-else".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(issuer().verify(&token).is_none());
    }

    #[test]
    fn test_non_numeric_subject_is_rejected() {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: "admin".to_string(),
            username: "admin".to_string(),
            role: Role::Admin,
            display_name: "Admin".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            iss: TOKEN_ISSUER.to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(issuer().decode(&token).is_ok());
        assert!(issuer().verify(&token).is_none());
    }

    #[test]
    fn test_unrepresentable_expiry_is_internal_error() {
        let issuer = TokenIssuer::new("test-secret", Duration::max_value());
        assert!(matches!(
            issuer.issue(&identity()),
            Err(AuthError::Internal(_))
        ));
    }
}
