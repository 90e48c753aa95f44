//! Admin passcode gate and tokens.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{FiledropError, Result};

/// Subject carried by every admin token.
const ADMIN_SUBJECT: &str = "admin";

/// Claims of an admin token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminClaims {
    /// Subject, always `"admin"`.
    pub sub: String,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// Token ID.
    pub jti: String,
}

/// Proof of a successful passcode check.
///
/// Only [`AdminGate`] can produce one, either by checking a passcode or by
/// verifying a previously issued token. Mutation operations take a reference
/// to it.
#[derive(Debug, Clone)]
pub struct AdminToken {
    claims: AdminClaims,
    encoded: String,
}

impl AdminToken {
    /// Signed token string, to hand back to the client.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Claims of the token.
    pub fn claims(&self) -> &AdminClaims {
        &self.claims
    }
}

/// Checks the shared admin passcode and issues short-lived signed tokens.
///
/// The gate keeps no session state; every token is re-verified on use.
#[derive(Clone)]
pub struct AdminGate {
    passcode: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry_secs: u64,
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate")
            .field("expiry_secs", &self.expiry_secs)
            .finish_non_exhaustive()
    }
}

impl AdminGate {
    /// Create a gate for `passcode`, signing tokens with `secret`.
    pub fn new(passcode: impl Into<String>, secret: &[u8], expiry_secs: u64) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.sub = Some(ADMIN_SUBJECT.to_string());

        Self {
            passcode: passcode.into(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            expiry_secs,
        }
    }

    /// Check a supplied passcode and issue a token on success.
    pub fn authorize(&self, supplied: &str) -> Result<AdminToken> {
        if self.passcode.is_empty() || !constant_time_eq(supplied.as_bytes(), self.passcode.as_bytes()) {
            tracing::warn!("Rejected admin passcode");
            return Err(FiledropError::Unauthorized("invalid passcode".to_string()));
        }

        let now = chrono::Utc::now().timestamp() as u64;
        let claims = AdminClaims {
            sub: ADMIN_SUBJECT.to_string(),
            iat: now,
            exp: now + self.expiry_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let encoded = encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode admin token: {}", e);
            FiledropError::Config("cannot sign admin token".to_string())
        })?;

        tracing::info!(jti = %claims.jti, "Issued admin token");
        Ok(AdminToken { claims, encoded })
    }

    /// Verify a token previously issued by this gate.
    pub fn verify(&self, token: &str) -> Result<AdminToken> {
        let data = decode::<AdminClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("Admin token validation failed: {}", e);
            FiledropError::Unauthorized("invalid or expired admin token".to_string())
        })?;

        Ok(AdminToken {
            claims: data.claims,
            encoded: token.to_string(),
        })
    }

    /// Token lifetime in seconds.
    pub fn expiry_secs(&self) -> u64 {
        self.expiry_secs
    }
}

/// Compare two byte strings without short-circuiting on the first difference.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    let max_len = a.len().max(b.len());

    for i in 0..max_len {
        let left = *a.get(i).unwrap_or(&0);
        let right = *b.get(i).unwrap_or(&0);
        diff |= usize::from(left ^ right);
    }

    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AdminGate {
        AdminGate::new("open-sesame", b"test-secret", 900)
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(constant_time_eq(b"", b""));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(!constant_time_eq(b"ab", b"abc"));
        // Trailing zero bytes must not make lengths match.
        assert!(!constant_time_eq(b"ab", b"ab\0"));
    }

    #[test]
    fn test_authorize_correct_passcode() {
        let token = gate().authorize("open-sesame").unwrap();
        assert_eq!(token.claims().sub, "admin");
        assert_eq!(token.claims().exp - token.claims().iat, 900);
        assert!(!token.as_str().is_empty());
    }

    #[test]
    fn test_authorize_wrong_passcode() {
        let gate = gate();
        for wrong in ["", "open", "open-sesame!", "OPEN-SESAME"] {
            assert!(matches!(
                gate.authorize(wrong),
                Err(FiledropError::Unauthorized(_))
            ));
        }
    }

    #[test]
    fn test_authorize_empty_configured_passcode() {
        let gate = AdminGate::new("", b"secret", 900);
        assert!(gate.authorize("").is_err());
    }

    #[test]
    fn test_verify_round_trip() {
        let gate = gate();
        let issued = gate.authorize("open-sesame").unwrap();

        let verified = gate.verify(issued.as_str()).unwrap();
        assert_eq!(verified.claims(), issued.claims());
    }

    #[test]
    fn test_verify_rejects_garbage() {
        assert!(matches!(
            gate().verify("not-a-token"),
            Err(FiledropError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_verify_rejects_other_secret() {
        let issued = gate().authorize("open-sesame").unwrap();
        let other = AdminGate::new("open-sesame", b"other-secret", 900);
        assert!(other.verify(issued.as_str()).is_err());
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = AdminClaims {
            sub: ADMIN_SUBJECT.to_string(),
            iat: now - 7200,
            exp: now - 3600,
            jti: "expired".to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(gate().verify(&token).is_err());
    }

    #[test]
    fn test_verify_rejects_wrong_subject() {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = AdminClaims {
            sub: "someone-else".to_string(),
            iat: now,
            exp: now + 600,
            jti: "x".to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(gate().verify(&token).is_err());
    }
}
