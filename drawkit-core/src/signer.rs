//! Signing-keypair file handling.
//!
//! Keypairs use the standard JSON byte-array file format, so keys generated
//! by the stock tooling load unchanged.

use crate::error::{CoreError, Result};
use solana_sdk::signature::Keypair;
use std::path::Path;

pub fn load_keypair(path: &Path) -> Result<Keypair> {
    let raw = std::fs::read_to_string(path)?;
    let bytes: Vec<u8> = serde_json::from_str(&raw)?;
    Keypair::from_bytes(&bytes).map_err(|e| {
        CoreError::config(format!("invalid keypair file {}: {}", path.display(), e))
    })
}

pub fn write_keypair(keypair: &Keypair, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = keypair.to_bytes().to_vec();
    std::fs::write(path, serde_json::to_string(&bytes)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signer::Signer;

    #[test]
    fn keypair_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.json");

        let keypair = Keypair::new();
        write_keypair(&keypair, &path).unwrap();

        let loaded = load_keypair(&path).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(load_keypair(&path).is_err());
    }
}
