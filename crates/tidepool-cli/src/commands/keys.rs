//! Key management commands.
//!
//! `tidepool keys generate` - Generate a new Biscuit keypair.

use std::path::PathBuf;
use tidepool_biscuit::KeyPair;

/// Generate a new Biscuit keypair.
pub fn generate(output: Option<PathBuf>) -> anyhow::Result<()> {
    let keypair = KeyPair::generate()?;

    if let Some(output_dir) = output {
        let (private_path, public_path) = keypair.save_to_dir(&output_dir)?;

        println!("✔ Generated Biscuit keypair:");
        println!("  Private key: {}", private_path.display());
        println!("  Public key:  {}", public_path.display());
        println!();
        println!("⚠️  Keep your private key secure! Never commit it to version control.");
        println!();
        println!("Point the server at the public key:");
        println!(
            "  export BISCUIT_PUBLIC_KEY=$(cat {})",
            public_path.display()
        );
    } else {
        println!("Private key (keep secure!):");
        println!("{}", keypair.private_key_hex());
        println!();
        println!("Public key:");
        println!("{}", keypair.public_key_hex());
        println!();
        println!("Use --output <dir> to save keys to files.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_generate_keys_to_files() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("keys");
        generate(Some(output.clone())).unwrap();

        let private_hex = fs::read_to_string(output.join("private.key")).unwrap();
        let public_hex = fs::read_to_string(output.join("public.key")).unwrap();

        // Hex keys should be 64 characters (32 bytes)
        assert_eq!(private_hex.len(), 64);
        assert_eq!(public_hex.len(), 64);
    }
}
