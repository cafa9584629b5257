use super::Store;
use crate::error::{KestrelError, KestrelResult};
use crate::types::{RedisString, RedisValue};

/// String operations over the shared keyspace.
pub struct StringOps<'a> {
    store: &'a mut Store,
}

fn string_value(data: Vec<u8>) -> RedisValue {
    RedisValue::String(RedisString::new(data))
}

impl<'a> StringOps<'a> {
    pub(super) fn new(store: &'a mut Store) -> Self {
        StringOps { store }
    }

    pub fn get(&mut self, key: &str) -> KestrelResult<Option<Vec<u8>>> {
        Ok(self.store.string(key)?.map(|s| s.as_bytes().to_vec()))
    }

    /// Unconditional set; any previous TTL is dropped.
    pub fn set(&mut self, key: &str, value: Vec<u8>) {
        self.store.insert(key, string_value(value));
    }

    pub fn set_with_expiry_at(&mut self, key: &str, value: Vec<u8>, at_ms: u64) {
        self.store.insert(key, string_value(value));
        self.store.set_expiry(key, at_ms);
    }

    pub fn set_with_ttl(&mut self, key: &str, value: Vec<u8>, ttl_ms: u64) {
        let at = self.store.now().saturating_add(ttl_ms);
        self.set_with_expiry_at(key, value, at);
    }

    pub fn set_keep_ttl(&mut self, key: &str, value: Vec<u8>) {
        self.store.insert_keep_ttl(key, string_value(value));
    }

    /// Set only if the key is absent. Returns true if the value was written.
    pub fn set_nx(&mut self, key: &str, value: Vec<u8>) -> bool {
        if self.store.contains(key) {
            return false;
        }
        self.set(key, value);
        true
    }

    pub fn append(&mut self, key: &str, data: &[u8]) -> KestrelResult<usize> {
        match self.store.string_mut(key)? {
            Some(s) => Ok(s.append(data)),
            None => {
                self.store.insert(key, string_value(data.to_vec()));
                Ok(data.len())
            }
        }
    }

    pub fn strlen(&mut self, key: &str) -> KestrelResult<usize> {
        Ok(self.store.string(key)?.map_or(0, |s| s.len()))
    }

    /// Add `delta` to the integer stored at `key` (0 if absent). The TTL of
    /// an existing key is preserved.
    pub fn incr_by(&mut self, key: &str, delta: i64) -> KestrelResult<i64> {
        let current = match self.store.string(key)? {
            Some(s) => s.as_i64().ok_or(KestrelError::NotInteger)?,
            None => 0,
        };
        let next = current.checked_add(delta).ok_or(KestrelError::Overflow)?;
        self.store
            .insert_keep_ttl(key, RedisValue::String(RedisString::from_i64(next)));
        Ok(next)
    }

    /// Values for each key; keys that are absent or not strings yield `None`.
    pub fn mget(&mut self, keys: &[String]) -> Vec<Option<Vec<u8>>> {
        keys.iter()
            .map(|k| self.get(k).ok().flatten())
            .collect()
    }

    pub fn mset(&mut self, pairs: Vec<(String, Vec<u8>)>) {
        for (key, value) in pairs {
            self.set(&key, value);
        }
    }

    /// Get the value and delete the key.
    pub fn getdel(&mut self, key: &str) -> KestrelResult<Option<Vec<u8>>> {
        let value = self.get(key)?;
        if value.is_some() {
            self.store.remove(key);
        }
        Ok(value)
    }
}
