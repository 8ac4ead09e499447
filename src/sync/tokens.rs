use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::StorageError;

pub const TOKENS_KEY: &str = "listTokens";
pub const ACTIVE_TOKEN_KEY: &str = "tcl-shopping-list-token";

/// String key-value persistence, e.g. a settings file.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// All keys in a single pretty-printed JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.load()?;
        map.insert(key.to_string(), value.to_string());
        self.save(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.load()?;
        if map.remove(key).is_some() {
            self.save(&map)?;
        }
        Ok(())
    }
}

/// In-memory store. Can be switched into a failing mode.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    values: Arc<Mutex<BTreeMap<String, String>>>,
    broken: Arc<Mutex<bool>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_broken(&self, broken: bool) {
        if let Ok(mut flag) = self.broken.lock() {
            *flag = broken;
        }
    }

    fn check(&self) -> Result<(), StorageError> {
        match self.broken.lock() {
            Ok(flag) if !*flag => Ok(()),
            _ => Err(StorageError::Unavailable("storage is disabled".into())),
        }
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.values
            .lock()
            .map_err(|_| StorageError::Unavailable("poisoned".into()))
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.values()?.remove(key);
        Ok(())
    }
}

/// Tokens of lists the user created or joined, plus the one currently open.
///
/// Persistence failures are logged and otherwise ignored: the cache keeps
/// working for the rest of the process from its in-memory copy.
pub struct TokenCache<K: KeyValueStore> {
    store: K,
    tokens: Vec<String>,
    active: Option<String>,
}

impl<K: KeyValueStore> TokenCache<K> {
    pub fn load(store: K) -> Self {
        let tokens = match store.get(TOKENS_KEY) {
            Ok(Some(json)) => serde_json::from_str::<Vec<String>>(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable token list: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Failed to read saved list tokens: {}", e);
                Vec::new()
            }
        };
        let mut deduped: Vec<String> = Vec::with_capacity(tokens.len());
        for token in tokens {
            let token = token.trim().to_string();
            if !token.is_empty() && !deduped.contains(&token) {
                deduped.push(token);
            }
        }

        let active = match store.get(ACTIVE_TOKEN_KEY) {
            Ok(Some(json)) => match json.as_str() {
                "null" | "undefined" => None,
                _ => serde_json::from_str::<Option<String>>(&json).unwrap_or(None),
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to read active list token: {}", e);
                None
            }
        };

        Self {
            store,
            tokens: deduped,
            active,
        }
    }

    /// Remember `token`. Blank tokens and repeats are ignored; returns whether
    /// the token was newly added.
    pub fn add(&mut self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            log::debug!("Not caching blank list token");
            return false;
        }
        if self.contains(token) {
            return false;
        }
        self.tokens.push(token.to_string());
        self.persist_tokens();
        true
    }

    /// Forget `token`. The list itself is untouched.
    pub fn remove(&mut self, token: &str) -> bool {
        let token = token.trim();
        let before = self.tokens.len();
        self.tokens.retain(|t| t != token);
        if self.tokens.len() == before {
            return false;
        }
        self.persist_tokens();
        true
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    pub fn list(&self) -> &[String] {
        &self.tokens
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn set_active(&mut self, token: Option<&str>) {
        self.active = token.map(str::to_string);
        let result = match &self.active {
            Some(t) => serde_json::to_string(t)
                .map_err(StorageError::from)
                .and_then(|json| self.store.set(ACTIVE_TOKEN_KEY, &json)),
            None => self.store.remove(ACTIVE_TOKEN_KEY),
        };
        if let Err(e) = result {
            log::warn!("Failed to save active list token: {}", e);
        }
    }

    fn persist_tokens(&self) {
        let result = serde_json::to_string(&self.tokens)
            .map_err(StorageError::from)
            .and_then(|json| self.store.set(TOKENS_KEY, &json));
        if let Err(e) = result {
            log::warn!("Failed to save list tokens: {}", e);
        }
    }
}
