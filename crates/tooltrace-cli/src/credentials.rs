//! API credentials for the live model backend.
//!
//! The key is read from `GOOGLE_AI_API_KEY`, after loading a dotenv file
//! (`.env.local` by default). Variables already present in the environment
//! win over the file.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

pub const API_KEY_VAR: &str = "GOOGLE_AI_API_KEY";
pub const DEFAULT_ENV_FILE: &str = ".env.local";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("GOOGLE_AI_API_KEY is not set; add it to {} or export it", env_file.display())]
    MissingApiKey { env_file: PathBuf },

    #[error("failed to load {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

pub struct Credentials {
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Load `env_file` (if it exists) and read the API key.
    pub fn load(env_file: &Path) -> Result<Self, CredentialError> {
        match dotenvy::from_path(env_file) {
            Ok(()) => debug!(path = %env_file.display(), "loaded env file"),
            Err(e) if e.not_found() => {
                debug!(path = %env_file.display(), "no env file; using process environment")
            }
            Err(source) => {
                return Err(CredentialError::EnvFile {
                    path: env_file.to_path_buf(),
                    source,
                });
            }
        }

        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Ok(Self { api_key: key }),
            _ => Err(CredentialError::MissingApiKey {
                env_file: env_file.to_path_buf(),
            }),
        }
    }
}
