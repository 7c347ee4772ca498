//! Session token commands.
//!
//! `tidepool token mint` - Mint a session token.
//! `tidepool token verify` - Verify a token and print its claims.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tidepool_biscuit::{KeyPair, PublicKey, TokenIssuer, TokenVerifier, keys};
use tidepool_core::BiscuitConfig;

/// Resolve a private key from either a file path or a hex-encoded string.
///
/// Falls back to the configured key when `key` is not given.
fn resolve_private_key(config: &BiscuitConfig, key: Option<String>) -> anyhow::Result<KeyPair> {
    let key_str = match key {
        Some(key) => key,
        None => config.resolve_private_key()?.context(
            "Private key not provided. Pass --key <path|hex>, set BISCUIT_PRIVATE_KEY or biscuit.private_key_file",
        )?,
    };

    // If it looks like a file path and the file exists, load from file
    let path = Path::new(&key_str);
    if path.exists() {
        return KeyPair::load_from_file(path)
            .with_context(|| format!("Failed to load private key from file: {}", path.display()));
    }

    KeyPair::from_private_key_hex(key_str.trim())
        .context("Failed to parse private key. Expected hex-encoded Ed25519 private key")
}

/// Resolve a public key from either a file path or a hex-encoded string.
fn resolve_public_key(config: &BiscuitConfig, key: Option<String>) -> anyhow::Result<PublicKey> {
    let key_str = match key {
        Some(key) => key,
        None => config.resolve_public_key()?.context(
            "Public key not provided. Pass --key <path|hex>, set BISCUIT_PUBLIC_KEY or biscuit.public_key_file",
        )?,
    };

    let path = Path::new(&key_str);
    if path.exists() {
        return keys::load_public_key_file(path)
            .with_context(|| format!("Failed to load public key from file: {}", path.display()));
    }

    keys::load_public_key_hex(key_str.trim())
        .context("Failed to parse public key. Expected hex-encoded Ed25519 public key")
}

/// Parse a duration string like "24h", "7d", "30m" into chrono::Duration.
pub fn parse_duration(s: &str) -> anyhow::Result<chrono::Duration> {
    let s = s.trim().to_lowercase();
    let parse = |n: &str| -> anyhow::Result<i64> {
        n.trim()
            .parse()
            .with_context(|| format!("Invalid duration: {:?}", s))
    };

    if let Some(hours) = s.strip_suffix('h') {
        return Ok(chrono::Duration::hours(parse(hours)?));
    }
    if let Some(days) = s.strip_suffix('d') {
        return Ok(chrono::Duration::days(parse(days)?));
    }
    if let Some(minutes) = s.strip_suffix('m') {
        return Ok(chrono::Duration::minutes(parse(minutes)?));
    }
    if let Some(seconds) = s.strip_suffix('s') {
        return Ok(chrono::Duration::seconds(parse(seconds)?));
    }

    // No suffix means hours
    Ok(chrono::Duration::hours(parse(&s)?))
}

/// Mint a session token.
pub fn mint(
    config: &BiscuitConfig,
    private_key: Option<String>,
    user: &str,
    session: Option<&str>,
    ttl: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let keypair = resolve_private_key(config, private_key)?;
    let ttl = parse_duration(ttl.as_deref().unwrap_or(&config.token_ttl))?;

    let (token, claims) = TokenIssuer::new(keypair).mint(user, session, ttl)?;

    if let Some(output_path) = output {
        fs::write(&output_path, &token)
            .with_context(|| format!("Failed to write token to {}", output_path.display()))?;
        println!("✔ Token written to: {}", output_path.display());
        println!("  Session: {}", claims.session_id);
        println!("  User:    {}", claims.user);
        println!("  Expires: {}", claims.expires_at.to_rfc3339());
    } else {
        println!("{}", token);
    }

    Ok(())
}

/// Verify a token and print its claims.
pub fn verify(config: &BiscuitConfig, public_key: Option<String>, token: String) -> anyhow::Result<()> {
    let verifier = TokenVerifier::new(resolve_public_key(config, public_key)?);

    // Load token from file if it looks like a path
    let token_str = if Path::new(&token).exists() {
        fs::read_to_string(&token)?.trim().to_string()
    } else {
        token
    };

    let verified = verifier
        .verify(&token_str)
        .context("Token verification failed")?;

    let expires = chrono::DateTime::from_timestamp(verified.expires_at, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| verified.expires_at.to_string());

    println!("✔ Token is valid");
    println!();
    println!("Token Details:");
    println!("  Session: {}", verified.session_id);
    println!("  User:    {}", verified.user);
    println!("  Expires: {}", expires);

    Ok(())
}
