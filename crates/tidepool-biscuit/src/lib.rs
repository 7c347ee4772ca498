//! # tidepool-biscuit
//!
//! Biscuit session tokens for the Tidepool MCP server.
//!
//! The HTTP transport needs exactly one fact from the authorization layer:
//! "this request belongs to session S". A session token is a Biscuit signed
//! with an Ed25519 key whose authority block carries:
//!
//! | Fact | Meaning |
//! |------|---------|
//! | `session_id("...")` | Session identity the request is routed to |
//! | `user("...")` | Principal the token was issued to |
//! | `expiry(<unix>)` | Expiration, enforced by a `time` check |
//!
//! Tokens are self-contained, so any process holding the public key can
//! verify them without a shared session table.

pub mod error;
pub mod keys;
pub mod token;

pub use biscuit_auth::PublicKey;
pub use error::BiscuitError;
pub use keys::KeyPair;
pub use token::{SessionClaims, TokenIssuer, TokenVerifier, VerifiedSession};
