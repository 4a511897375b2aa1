//! Key/value store backing simulated resources.
//!
//! Simulated resources keep every piece of state under `<resource>.<field>`
//! keys, so tests and tools can inspect or inject values by name.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sonic_sdi::{SdiError, SdiResult};
use std::fmt::Display;
use std::str::FromStr;

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str) -> Option<String>;

    /// All keys, sorted.
    fn keys(&self) -> Vec<String>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

/// Typed accessors over any [`KvStore`].
pub trait StoreExt: KvStore {
    /// Parses the value at `key`, `None` when unset.
    fn get_parsed<T>(&self, key: &str) -> SdiResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| {
                SdiError::internal(format!("store key {} holds {:?}: {}", key, raw, e))
            }),
        }
    }

    fn get_or<T>(&self, key: &str, default: T) -> SdiResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.get_parsed(key)?.unwrap_or(default))
    }

    fn set_value<T: Display>(&self, key: &str, value: T) {
        self.set(key, value.to_string());
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> SdiResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| SdiError::internal(format!("store key {}: {}", key, e))),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> SdiResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| SdiError::internal(format!("store key {}: {}", key, e)))?;
        self.set(key, raw);
        Ok(())
    }
}

impl<S: KvStore + ?Sized> StoreExt for S {}
