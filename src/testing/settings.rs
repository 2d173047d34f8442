//! Run-scoped key/value settings
//!
//! Artifacts contribute settings the first time they run a test. Fixtures
//! read them by taking `Settings` as a constructor parameter.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct Settings {
    values: RwLock<BTreeMap<String, String>>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    /// Copy every entry of `settings` in, overwriting existing keys
    pub fn merge<'a>(&self, settings: impl IntoIterator<Item = (&'a String, &'a String)>) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in settings {
            values.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
