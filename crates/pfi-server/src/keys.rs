//! PFI key files: `<keys_dir>/<file>.json`, created on first start.

use std::path::Path;

use pfi_types::{BearerIdentity, Did, PfiError, Result, Signer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyFile {
    did: Did,
    secret_key_hex: String,
}

/// Load the identity stored in `dir/file`, or generate one and store it.
///
/// # Errors
/// [`PfiError::Configuration`] if the file is unreadable or its DID does not
/// match its key.
pub async fn load_or_create(dir: &Path, file: &str) -> Result<BearerIdentity> {
    let path = dir.join(file);
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => {
            let stored: KeyFile = serde_json::from_str(&contents)
                .map_err(|e| PfiError::Configuration(format!("{}: {e}", path.display())))?;
            let identity = BearerIdentity::from_secret_hex(&stored.secret_key_hex)?;
            if identity.did() != &stored.did {
                return Err(PfiError::Configuration(format!(
                    "{}: key does not belong to {}",
                    path.display(),
                    stored.did
                )));
            }
            tracing::debug!(path = %path.display(), did = %identity.did().short(), "loaded PFI key");
            Ok(identity)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let identity = BearerIdentity::generate();
            let stored = KeyFile {
                did: identity.did().clone(),
                secret_key_hex: identity.secret_hex(),
            };
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, serde_json::to_vec_pretty(&stored)?).await?;
            tracing::info!(path = %path.display(), did = %identity.did(), "created PFI key");
            Ok(identity)
        }
        Err(e) => Err(PfiError::Configuration(format!("{}: {e}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_key_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create(dir.path(), "aquafinance.json").await.unwrap();
        let second = load_or_create(dir.path(), "aquafinance.json").await.unwrap();
        assert_eq!(first.did(), second.did());
    }

    #[tokio::test]
    async fn mismatched_did_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = BearerIdentity::deterministic(1);
        let b = BearerIdentity::deterministic(2);
        let forged = KeyFile {
            did: a.did().clone(),
            secret_key_hex: b.secret_hex(),
        };
        std::fs::write(dir.path().join("pfi.json"), serde_json::to_vec(&forged).unwrap()).unwrap();
        assert!(matches!(
            load_or_create(dir.path(), "pfi.json").await,
            Err(PfiError::Configuration(_))
        ));
    }
}
