//! Bearer-token storage and the single-writer session handle the pipeline owns.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to persist session token to {path}: {source}")]
    Persist { path: PathBuf, source: io::Error },
    #[error("failed to remove session token file {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
    #[error("refusing to store an empty session token")]
    EmptyToken,
}

/// Storage primitive for the bearer token.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

#[derive(Default)]
pub struct MemorySessionStore {
    token: RwLock<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, token: &str) -> Result<(), SessionError> {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

/// Keeps the token in a plain file so it survives process restarts.
pub struct FileSessionStore {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl FileSessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = match fs::read_to_string(&path) {
            Ok(raw) => Some(raw.trim().to_string()).filter(|token| !token.is_empty()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "session: unreadable token file ignored");
                None
            }
        };
        Self {
            path,
            cached: RwLock::new(cached),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<String> {
        self.cached
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, token: &str) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SessionError::Persist {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, token).map_err(|source| SessionError::Persist {
            path: self.path.clone(),
            source,
        })?;
        *self
            .cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self
            .cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Read access is public; only this crate establishes or tears down the session.
#[derive(Clone)]
pub struct AuthSession {
    store: Arc<dyn SessionStore>,
}

impl AuthSession {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn token(&self) -> Option<String> {
        self.store.get().filter(|token| !token.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub(crate) fn establish(&self, token: &str) -> Result<(), SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::EmptyToken);
        }
        self.store.set(token)?;
        debug!("session: token established");
        Ok(())
    }

    /// Returns whether a token was present before teardown.
    pub(crate) fn teardown(&self) -> bool {
        let had_token = self.token().is_some();
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "session: failed to clear stored token");
        }
        debug!(had_token, "session: token cleared");
        had_token
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
