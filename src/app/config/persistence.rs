use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::player::Preferences;

const PLAYER_KEY: &str = "player";
const CONNECTION_KEY: &str = "connection";
const SESSION_KEY: &str = "session";

/// String-keyed storage of TOML values.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<toml::Value>;
    fn set(&mut self, key: &str, value: toml::Value) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

pub fn load_value<T, K>(store: &K, key: &str) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
    K: KeyValueStore + ?Sized,
{
    match store.get(key) {
        Some(value) => value.try_into().map(Some).map_err(|source| StoreError::Decode {
            key: key.to_string(),
            source,
        }),
        None => Ok(None),
    }
}

pub fn save_value<T, K>(store: &mut K, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize,
    K: KeyValueStore + ?Sized,
{
    let value = toml::Value::try_from(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, value)
}

/// Non-persistent store, for tests and `--dry-run`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, toml::Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<toml::Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: toml::Value) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }
}

/// One TOML file, one top-level table per key. Every write rewrites the file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: toml::Table,
}

impl FileStore {
    /// Open `path`, starting empty when it is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let table = match fs::read_to_string(&path) {
            Ok(content) => content.parse::<toml::Table>().unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "state file is corrupt, starting fresh");
                toml::Table::new()
            }),
            Err(_) => toml::Table::new(),
        };
        Self { path, table }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.table).map_err(|source| StoreError::Encode {
            key: self.path.display().to_string(),
            source,
        })?;
        fs::write(&self.path, content)?;
        debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<toml::Value> {
        self.table.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: toml::Value) -> Result<(), StoreError> {
        self.table.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.table.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Whether the catalog was reachable and an audio output attached, as of
/// the last run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Only the signed-in user is kept between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Automatically saved session state
/// stored in `state.toml`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistentState {
    pub player: Preferences,
    pub connection: ConnectionState,
    pub session: UserSession,
}

impl PersistentState {
    /// Read every section, falling back to defaults per section.
    pub fn load<K: KeyValueStore + ?Sized>(store: &K) -> Self {
        Self {
            player: load_or_default(store, PLAYER_KEY),
            connection: load_or_default(store, CONNECTION_KEY),
            session: load_or_default(store, SESSION_KEY),
        }
    }

    pub fn save<K: KeyValueStore + ?Sized>(&self, store: &mut K) -> Result<(), StoreError> {
        save_value(store, PLAYER_KEY, &self.player)?;
        save_value(store, CONNECTION_KEY, &self.connection)?;
        match &self.session.user {
            Some(_) => save_value(store, SESSION_KEY, &self.session),
            None => store.remove(SESSION_KEY),
        }
    }

    pub fn sign_out<K: KeyValueStore + ?Sized>(&mut self, store: &mut K) -> Result<(), StoreError> {
        self.session = UserSession::default();
        store.remove(SESSION_KEY)
    }
}

fn load_or_default<T, K>(store: &K, key: &str) -> T
where
    T: DeserializeOwned + Default,
    K: KeyValueStore + ?Sized,
{
    load_value(store, key).unwrap_or_else(|e| {
        warn!(key, error = %e, "ignoring unreadable saved state");
        None
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::RepeatMode;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("jamtune-test-{}-{}", std::process::id(), name))
            .join("state.toml")
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let store = MemoryStore::new();
        let state = PersistentState::load(&store);
        assert_eq!(state, PersistentState::default());
        assert_eq!(state.player.volume, 50);
    }

    #[test]
    fn test_round_trip_through_file() {
        let path = scratch_path("roundtrip");
        let _ = fs::remove_file(&path);

        let mut state = PersistentState::default();
        state.player.volume = 80;
        state.player.repeat_mode = RepeatMode::One;
        state.player.history = vec!["7".into(), "3".into()];
        state.connection.configured = true;
        state.session.user = Some(UserProfile {
            id: "u1".into(),
            name: "listener".into(),
        });

        let mut store = FileStore::open(&path);
        state.save(&mut store).unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(PersistentState::load(&reopened), state);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_sign_out_drops_only_the_session() {
        let mut store = MemoryStore::new();
        let mut state = PersistentState::default();
        state.player.shuffle = true;
        state.session.user = Some(UserProfile {
            id: "u1".into(),
            name: String::new(),
        });
        state.save(&mut store).unwrap();
        assert!(store.get(SESSION_KEY).is_some());

        state.sign_out(&mut store).unwrap();
        assert!(store.get(SESSION_KEY).is_none());
        assert!(PersistentState::load(&store).player.shuffle);
    }

    #[test]
    fn test_bad_section_falls_back() {
        let mut store = MemoryStore::new();
        store
            .set(PLAYER_KEY, toml::Value::String("not a table".into()))
            .unwrap();
        let err = load_value::<Preferences, _>(&store, PLAYER_KEY).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
        assert_eq!(PersistentState::load(&store).player, Preferences::default());
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let path = scratch_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "this is = = not toml").unwrap();

        let store = FileStore::open(&path);
        assert!(store.get(PLAYER_KEY).is_none());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
