//! Where OAuth tokens live between runs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::keyring_store;
use super::oauth::OAuthTokens;
use crate::error::OAuthError;

/// Which backend `calendar.token_store` selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStoreKind {
    #[default]
    Keyring,
    File,
}

/// Token persistence: the OS keyring, or a JSON file per service in a
/// directory (for headless boards without a secret service).
#[derive(Debug, Clone)]
pub enum TokenStore {
    Keyring,
    File { dir: PathBuf },
}

impl TokenStore {
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self::File { dir: dir.into() }
    }

    pub fn token_path(dir: &Path, service: &str) -> PathBuf {
        dir.join(format!("{service}_token.json"))
    }

    pub fn load(&self, service: &str) -> Result<Option<OAuthTokens>, OAuthError> {
        let json = match self {
            Self::Keyring => keyring_store::get(service)?,
            Self::File { dir } => match fs::read_to_string(Self::token_path(dir, service)) {
                Ok(json) => Some(json),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
                Err(err) => return Err(OAuthError::Storage(err.to_string())),
            },
        };

        json.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| OAuthError::Storage(format!("corrupt stored token for {service}: {e}")))
        })
        .transpose()
    }

    pub fn save(&self, service: &str, tokens: &OAuthTokens) -> Result<(), OAuthError> {
        let json = serde_json::to_string(tokens)
            .map_err(|e| OAuthError::Storage(e.to_string()))?;
        match self {
            Self::Keyring => keyring_store::set(service, &json),
            Self::File { dir } => {
                fs::create_dir_all(dir).map_err(|e| OAuthError::Storage(e.to_string()))?;
                let path = Self::token_path(dir, service);
                write_private(&path, &json).map_err(|e| {
                    OAuthError::Storage(format!("cannot write {}: {e}", path.display()))
                })?;
                tracing::debug!(path = %path.display(), "saved oauth token");
                Ok(())
            }
        }
    }

    pub fn delete(&self, service: &str) -> Result<(), OAuthError> {
        match self {
            Self::Keyring => keyring_store::delete(service),
            Self::File { dir } => match fs::remove_file(Self::token_path(dir, service)) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(OAuthError::Storage(err.to_string())),
            },
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens() -> OAuthTokens {
        OAuthTokens {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(1_700_000_000),
            token_type: "Bearer".to_string(),
            scope: None,
        }
    }

    #[test]
    fn file_store_save_load_delete() {
        let dir = tempdir().unwrap();
        let store = TokenStore::file(dir.path());

        assert_eq!(store.load("google").unwrap(), None);
        store.save("google", &tokens()).unwrap();
        assert_eq!(store.load("google").unwrap(), Some(tokens()));

        store.delete("google").unwrap();
        assert_eq!(store.load("google").unwrap(), None);
        store.delete("google").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        TokenStore::file(dir.path()).save("google", &tokens()).unwrap();
        let meta = fs::metadata(TokenStore::token_path(dir.path(), "google")).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_storage_error() {
        let dir = tempdir().unwrap();
        fs::write(TokenStore::token_path(dir.path(), "google"), "{not json").unwrap();
        let err = TokenStore::file(dir.path()).load("google").unwrap_err();
        assert!(matches!(err, OAuthError::Storage(_)));
    }
}
