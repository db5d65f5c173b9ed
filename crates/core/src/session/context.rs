use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::ApiError;
use crate::session::Session;

const SESSION_KEY: &str = "session";
const THEME_KEY: &str = "theme";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store I/O failed for `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("key-value store contents are not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("key-value store lock is poisoned")]
    Poisoned,
}

/// Persistence adapter for the application context.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for InMemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Stores all keys in one JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StoreError::Io { path: self.path.clone(), source }),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(entries)?;
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }
        fs::write(&self.path, raw)
            .map_err(|source| StoreError::Io { path: self.path.clone(), source })
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read_all()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    username: String,
    role: String,
    token: Option<String>,
}

/// Session and preferences shared by the views, persisted through a
/// [`KeyValueStore`].
pub struct AppContext {
    store: Arc<dyn KeyValueStore>,
    session: Option<Session>,
    theme: Theme,
}

impl AppContext {
    /// Restores whatever the store holds. An unreadable session entry is
    /// discarded rather than failing startup.
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let session = match store.load(SESSION_KEY)? {
            Some(raw) => match serde_json::from_str::<StoredSession>(&raw) {
                Ok(stored) => Some(Session::new(
                    stored.username,
                    &stored.role,
                    stored.token.map(SecretString::from),
                )),
                Err(error) => {
                    warn!(error = %error, "discarding unreadable stored session");
                    store.remove(SESSION_KEY)?;
                    None
                }
            },
            None => None,
        };

        let theme = store
            .load(THEME_KEY)?
            .and_then(|raw| serde_json::from_str::<Theme>(&raw).ok())
            .unwrap_or_default();

        Ok(Self { store, session, theme })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn sign_in(&mut self, session: Session) -> Result<(), StoreError> {
        let stored = StoredSession {
            username: session.username.clone(),
            role: session.role.as_str().to_owned(),
            token: session.token.as_ref().map(|token| token.expose_secret().to_owned()),
        };
        self.store.save(SESSION_KEY, &serde_json::to_string(&stored)?)?;
        info!(
            event_name = "session.signed_in",
            username = %session.username,
            role = session.role.as_str(),
            "session established"
        );
        self.session = Some(session);
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<(), StoreError> {
        self.session = None;
        self.store.remove(SESSION_KEY)
    }

    /// Drops the session when the backend reports it unauthorized. Returns
    /// whether the session was invalidated.
    pub fn handle_api_error(&mut self, error: &ApiError) -> Result<bool, StoreError> {
        if !error.is_unauthorized() || self.session.is_none() {
            return Ok(false);
        }

        warn!(event_name = "session.invalidated", "backend rejected session credentials");
        self.sign_out()?;
        Ok(true)
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), StoreError> {
        self.store.save(THEME_KEY, &serde_json::to_string(&theme)?)?;
        self.theme = theme;
        Ok(())
    }
}
