//! Session token creation and verification.

use crate::error::BiscuitError;
use crate::keys::KeyPair;
use biscuit_auth::builder::AuthorizerBuilder;
use biscuit_auth::macros::fact;
use biscuit_auth::{Authorizer, Biscuit, PublicKey};
use chrono::{DateTime, Duration, Utc};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub session_id: String,
    pub user: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints session tokens with a private key.
pub struct TokenIssuer {
    keypair: KeyPair,
}

impl TokenIssuer {
    /// Create a new issuer with the given keypair.
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// Mint a session token for `user`.
    ///
    /// A fresh random session id is assigned when `session_id` is `None`.
    pub fn mint(
        &self,
        user: &str,
        session_id: Option<&str>,
        ttl: Duration,
    ) -> Result<(String, SessionClaims), BiscuitError> {
        validate_claim("user", user)?;
        let session_id = match session_id {
            Some(id) => {
                validate_claim("session id", id)?;
                id.to_string()
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        if ttl <= Duration::zero() {
            return Err(BiscuitError::InvalidClaim {
                claim: "ttl",
                reason: "must be positive".to_string(),
            });
        }

        let expires_at = Utc::now() + ttl;
        let expiry = expires_at.timestamp();

        let biscuit = Biscuit::builder()
            .fact(fact!("session_id({id})", id = session_id.clone()))
            .and_then(|b| b.fact(fact!("user({user})", user = user.to_string())))
            .and_then(|b| b.fact(fact!("expiry({expiry})", expiry = expiry)))
            .and_then(|b| b.code(format!("check if time($time), $time < {expiry};")))
            .map_err(|e| BiscuitError::TokenCreationFailed(e.to_string()))?
            .build(self.keypair.inner())
            .map_err(|e| BiscuitError::TokenCreationFailed(e.to_string()))?;

        let token = biscuit
            .to_base64()
            .map_err(|e| BiscuitError::TokenCreationFailed(e.to_string()))?;

        tracing::debug!(session_id = %session_id, user = %user, "Minted session token");

        Ok((
            token,
            SessionClaims {
                session_id,
                user: user.to_string(),
                expires_at,
            },
        ))
    }
}

/// Verifier for session tokens.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
    public_key: PublicKey,
}

impl TokenVerifier {
    /// Create a new token verifier with the given public key.
    pub fn new(public_key: PublicKey) -> Self {
        Self { public_key }
    }

    /// Verify a token against the current time and extract its claims.
    pub fn verify(&self, token: &str) -> Result<VerifiedSession, BiscuitError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as of `now` (unix seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedSession, BiscuitError> {
        let biscuit = Biscuit::from_base64(token.trim(), self.public_key.clone())
            .map_err(|e| BiscuitError::TokenParseFailed(e.to_string()))?;

        let mut authorizer = AuthorizerBuilder::new()
            .code(format!(
                r#"
                time({now});
                allow if session_id($s);
                "#
            ))
            .map_err(|e| BiscuitError::VerificationFailed(e.to_string()))?
            .build(&biscuit)
            .map_err(|e| BiscuitError::VerificationFailed(e.to_string()))?;

        // Fails on an expired token through the authority block's time check.
        authorizer
            .authorize()
            .map_err(|e| BiscuitError::VerificationFailed(e.to_string()))?;

        let session_id = query_string(&mut authorizer, "session_id")?;
        let user = query_string(&mut authorizer, "user")?;
        let expires_at = query_i64(&mut authorizer, "expiry")?;

        Ok(VerifiedSession {
            session_id,
            user,
            expires_at,
        })
    }
}

/// Claims of a verified session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub session_id: String,
    pub user: String,
    /// Expiration as unix seconds.
    pub expires_at: i64,
}

fn parse_rule(name: &str) -> Result<biscuit_auth::builder::Rule, BiscuitError> {
    format!("data($x) <- {}($x)", name)
        .parse()
        .map_err(|e: biscuit_auth::error::Token| BiscuitError::VerificationFailed(e.to_string()))
}

fn query_string(authorizer: &mut Authorizer, name: &str) -> Result<String, BiscuitError> {
    let results: Vec<(String,)> = authorizer
        .query(parse_rule(name)?)
        .map_err(|e| BiscuitError::VerificationFailed(e.to_string()))?;
    results
        .into_iter()
        .next()
        .map(|(s,)| s)
        .ok_or_else(|| BiscuitError::MissingClaim {
            claim: name.to_string(),
        })
}

fn query_i64(authorizer: &mut Authorizer, name: &str) -> Result<i64, BiscuitError> {
    let results: Vec<(i64,)> = authorizer
        .query(parse_rule(name)?)
        .map_err(|e| BiscuitError::VerificationFailed(e.to_string()))?;
    results
        .into_iter()
        .next()
        .map(|(v,)| v)
        .ok_or_else(|| BiscuitError::MissingClaim {
            claim: name.to_string(),
        })
}

/// Claims double as storage keys, so keep them short and printable.
fn validate_claim(claim: &'static str, value: &str) -> Result<(), BiscuitError> {
    if value.is_empty() || value.len() > 128 {
        return Err(BiscuitError::InvalidClaim {
            claim,
            reason: "must be 1 to 128 characters".to_string(),
        });
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | ':')))
    {
        return Err(BiscuitError::InvalidClaim {
            claim,
            reason: format!("character '{}' is not allowed", c),
        });
    }
    Ok(())
}
