//! Opaque key store.
//!
//! A [`KeyStore`] maps randomly generated external keys to internal values. It is the
//! indirection used by the obfuscation layer: callers only ever see keys, never the node
//! identifiers they resolve to.
//!
//! Reverse lookups compare values with their [`PartialEq`] implementation. For plain values
//! (node identifiers, strings) that is value equality; for [`TreeHandle`](crate::TreeHandle)
//! it is handle identity, so two structurally identical embedded trees never alias.
//!
//! ```rust
//! # use pathtree::{KeyStore, NodeId};
//! let mut store = KeyStore::new();
//! let key = store.put(NodeId::from("_root_:0"));
//! assert_eq!(store.get(&key), Some(&NodeId::from("_root_:0")));
//! assert_eq!(store.reverse_lookup_exactly_one(&NodeId::from("_root_:0")).unwrap(), key);
//! ```
use std::fmt::Debug;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::error::{TreeError, TreeResult};

/// Textual form of generated keys.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStyle {
    /// 32 lowercase hex digits.
    #[default]
    Simple,
    /// Canonical 8-4-4-4-12 form.
    Hyphenated,
}

impl KeyStyle {
    fn mint(self) -> String {
        let uuid = Uuid::new_v4();
        match self {
            KeyStyle::Simple => uuid.simple().to_string(),
            KeyStyle::Hyphenated => uuid.hyphenated().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyStore<V> {
    entries: IndexMap<String, V>,
    style: KeyStyle,
}

impl<V> Default for KeyStore<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            style: KeyStyle::default(),
        }
    }
}

impl<V: Clone + PartialEq + Debug> KeyStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_style(style: KeyStyle) -> Self {
        Self {
            entries: IndexMap::new(),
            style,
        }
    }

    pub fn style(&self) -> KeyStyle {
        self.style
    }

    fn fresh_key(&self) -> String {
        loop {
            let key = self.style.mint();
            if !self.entries.contains_key(&key) {
                return key;
            }
        }
    }

    /// Register `value` under a newly minted key and return the key.
    ///
    /// The value is not checked against existing entries; use
    /// [`KeyStore::key_for_or_insert`] to keep the store bijective.
    pub fn put(&mut self, value: V) -> String {
        let key = self.fresh_key();
        self.entries.insert(key.clone(), value);
        key
    }

    /// Existing key of `value`, or a newly minted one if the value is not registered yet.
    pub fn key_for_or_insert(&mut self, value: V) -> String {
        let existing = self.reverse_lookup(&value).first().map(|key| key.to_string());
        match existing {
            Some(key) => key,
            None => self.put(value),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Resolve `key`, failing with [`TreeError::UnknownKey`] if it is not registered.
    pub fn lookup_or_unknown(&self, key: &str) -> TreeResult<&V> {
        self.entries.get(key).ok_or_else(|| TreeError::UnknownKey {
            key: key.to_string(),
        })
    }

    /// Every key whose value equals `value`, in registration order.
    pub fn reverse_lookup(&self, value: &V) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, candidate)| *candidate == value)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// The single key resolving to `value`.
    ///
    /// Fails with [`TreeError::ValueNotFound`] when no key matches and with
    /// [`TreeError::AmbiguousKey`] when several do.
    pub fn reverse_lookup_exactly_one(&self, value: &V) -> TreeResult<&str> {
        let mut keys = self.reverse_lookup(value);
        match keys.len() {
            0 => Err(TreeError::ValueNotFound {
                value: format!("{:?}", value),
            }),
            1 => Ok(keys.remove(0)),
            _ => Err(TreeError::AmbiguousKey {
                value: format!("{:?}", value),
                keys: keys.into_iter().map(str::to_string).collect(),
            }),
        }
    }

    /// Point an existing key at a new value, returning the previous one.
    pub fn replace_value(&mut self, key: &str, value: V) -> TreeResult<V> {
        let slot = self
            .entries
            .get_mut(key)
            .ok_or_else(|| TreeError::UnknownKey {
                key: key.to_string(),
            })?;
        Ok(std::mem::replace(slot, value))
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.shift_remove(key)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &V) -> bool) {
        self.entries.retain(|key, value| keep(key, value));
    }

    /// Rewrite every value in place.
    pub fn map_values(&mut self, mut f: impl FnMut(&V) -> V) {
        for value in self.entries.values_mut() {
            *value = f(value);
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_random_and_styled() {
        let mut simple = KeyStore::new();
        let a = simple.put("x".to_string());
        let b = simple.put("x".to_string());
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(!a.contains('-'));

        let mut hyphenated = KeyStore::with_style(KeyStyle::Hyphenated);
        let c = hyphenated.put(1u32);
        assert_eq!(c.len(), 36);
        assert_eq!(c.matches('-').count(), 4);
    }

    #[test]
    fn exactly_one_rejects_missing_and_duplicates() {
        let mut store = KeyStore::new();
        store.put(1u32);
        store.put(1u32);
        store.put(2u32);

        assert!(store.reverse_lookup_exactly_one(&2).is_ok());
        assert!(matches!(
            store.reverse_lookup_exactly_one(&1),
            Err(TreeError::AmbiguousKey { ref keys, .. }) if keys.len() == 2
        ));
        assert!(
            store
                .reverse_lookup_exactly_one(&3)
                .unwrap_err()
                .kind()
                .is_not_found()
        );
    }

    #[test]
    fn key_for_or_insert_is_bijective() {
        let mut store = KeyStore::new();
        let first = store.key_for_or_insert("a");
        let second = store.key_for_or_insert("a");
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_key_errors() {
        let mut store: KeyStore<u8> = KeyStore::new();
        assert!(store.lookup_or_unknown("nope").unwrap_err().is_unknown_key());
        assert!(store.replace_value("nope", 3).is_err());
    }

    #[test]
    fn replace_and_remove() {
        let mut store = KeyStore::new();
        let key = store.put(5u8);
        assert_eq!(store.replace_value(&key, 6).unwrap(), 5);
        assert_eq!(store.get(&key), Some(&6));
        assert_eq!(store.remove(&key), Some(6));
        assert!(store.is_empty());
    }
}
