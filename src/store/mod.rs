pub mod expiry;
pub mod hash;
pub mod key;
pub mod list;
pub mod server;
pub mod set;
pub mod snapshot;
pub mod sorted_set;
pub mod string;

use crate::clock::Clock;
use crate::error::{KestrelError, KestrelResult};
use crate::types::{RedisHash, RedisList, RedisSet, RedisSortedSet, RedisString, RedisValue};
use rand::seq::IteratorRandom;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use hash::HashOps;
pub use key::KeyOps;
pub use list::ListOps;
pub use server::ServerOps;
pub use set::SetOps;
pub use sorted_set::ZSetOps;
pub use string::StringOps;

/// Result of one active-expiration sampling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub sampled: usize,
    pub expired: usize,
}

/// The keyspace: values plus absolute expiration instants.
///
/// A key appears in `expires` only while it also appears in `data`; stray
/// expiration entries are dropped whenever they are noticed.
#[derive(Debug)]
pub struct Store {
    data: HashMap<String, RedisValue>,
    expires: HashMap<String, u64>,
    clock: Arc<dyn Clock>,
    /// Set while a command runs so every deadline it computes uses one instant.
    pinned_now: Option<u64>,
    /// Keys removed because their TTL passed, lazily or by the sweep.
    pub expired_keys: u64,
}

macro_rules! typed_access {
    ($variant:ident, $ty:ty, $get:ident, $get_mut:ident) => {
        pub(crate) fn $get(&mut self, key: &str) -> KestrelResult<Option<&$ty>> {
            match self.get_value(key) {
                None => Ok(None),
                Some(RedisValue::$variant(v)) => Ok(Some(v)),
                Some(_) => Err(KestrelError::WrongType),
            }
        }

        pub(crate) fn $get_mut(&mut self, key: &str) -> KestrelResult<Option<&mut $ty>> {
            match self.get_value_mut(key) {
                None => Ok(None),
                Some(RedisValue::$variant(v)) => Ok(Some(v)),
                Some(_) => Err(KestrelError::WrongType),
            }
        }
    };
    ($variant:ident, $ty:ty, $get:ident, $get_mut:ident, $get_or_create:ident) => {
        typed_access!($variant, $ty, $get, $get_mut);

        /// Containers are created on first write; strings never are.
        pub(crate) fn $get_or_create(&mut self, key: &str) -> KestrelResult<&mut $ty> {
            self.expire_if_needed(key);
            let value = self
                .data
                .entry(key.to_string())
                .or_insert_with(|| RedisValue::$variant(<$ty>::default()));
            match value {
                RedisValue::$variant(v) => Ok(v),
                _ => Err(KestrelError::WrongType),
            }
        }
    };
}

impl Store {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Store {
            data: HashMap::new(),
            expires: HashMap::new(),
            clock,
            pinned_now: None,
            expired_keys: 0,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> u64 {
        self.pinned_now.unwrap_or_else(|| self.clock.now_millis())
    }

    /// Freeze `now()` at the current clock reading until `unpin_time`.
    pub(crate) fn pin_time(&mut self) -> u64 {
        let now = self.clock.now_millis();
        self.pinned_now = Some(now);
        now
    }

    pub(crate) fn unpin_time(&mut self) {
        self.pinned_now = None;
    }

    pub fn strings(&mut self) -> StringOps<'_> {
        StringOps::new(self)
    }

    pub fn lists(&mut self) -> ListOps<'_> {
        ListOps::new(self)
    }

    pub fn hashes(&mut self) -> HashOps<'_> {
        HashOps::new(self)
    }

    pub fn sets(&mut self) -> SetOps<'_> {
        SetOps::new(self)
    }

    pub fn zsets(&mut self) -> ZSetOps<'_> {
        ZSetOps::new(self)
    }

    pub fn keys(&mut self) -> KeyOps<'_> {
        KeyOps::new(self)
    }

    pub fn server(&mut self) -> ServerOps<'_> {
        ServerOps::new(self)
    }

    fn is_expired_at(&self, key: &str, now: u64) -> bool {
        self.expires.get(key).is_some_and(|&at| at <= now)
    }

    /// Remove `key` if its expiration instant has passed. Returns true if
    /// the key was removed.
    pub(crate) fn expire_if_needed(&mut self, key: &str) -> bool {
        if !self.is_expired_at(key, self.now()) {
            return false;
        }
        let existed = self.data.remove(key).is_some();
        self.expires.remove(key);
        if existed {
            self.expired_keys += 1;
        }
        existed
    }

    pub(crate) fn get_value(&mut self, key: &str) -> Option<&RedisValue> {
        self.expire_if_needed(key);
        self.data.get(key)
    }

    pub(crate) fn get_value_mut(&mut self, key: &str) -> Option<&mut RedisValue> {
        self.expire_if_needed(key);
        self.data.get_mut(key)
    }

    pub(crate) fn contains(&mut self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Store `value` under `key`, discarding any previous TTL.
    pub(crate) fn insert(&mut self, key: &str, value: RedisValue) {
        self.expires.remove(key);
        self.data.insert(key.to_string(), value);
    }

    /// Store `value` under `key`, keeping the TTL of a live previous value.
    pub(crate) fn insert_keep_ttl(&mut self, key: &str, value: RedisValue) {
        self.expire_if_needed(key);
        self.data.insert(key.to_string(), value);
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<RedisValue> {
        self.expire_if_needed(key);
        self.expires.remove(key);
        self.data.remove(key)
    }

    /// Delete `key` if it holds a container that has become empty.
    pub(crate) fn remove_if_empty(&mut self, key: &str) {
        if self.data.get(key).is_some_and(RedisValue::is_empty_container) {
            self.data.remove(key);
            self.expires.remove(key);
        }
    }

    pub(crate) fn expiry_of(&mut self, key: &str) -> Option<u64> {
        if !self.contains(key) {
            self.expires.remove(key);
            return None;
        }
        self.expires.get(key).copied()
    }

    /// Set an absolute expiration on an existing key.
    pub(crate) fn set_expiry(&mut self, key: &str, at_ms: u64) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.expires.insert(key.to_string(), at_ms);
        true
    }

    pub(crate) fn clear_expiry(&mut self, key: &str) -> bool {
        self.expires.remove(key).is_some()
    }

    /// Drop every key whose TTL has passed. Used before whole-keyspace
    /// iteration so expired keys are never reported.
    pub(crate) fn purge_expired(&mut self) -> usize {
        let now = self.now();
        let expired: Vec<String> = self
            .expires
            .iter()
            .filter(|&(_, &at)| at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        let mut removed = 0;
        for key in expired {
            self.expires.remove(&key);
            if self.data.remove(&key).is_some() {
                removed += 1;
            }
        }
        self.expired_keys += removed as u64;
        removed
    }

    /// Live keys in byte order.
    pub(crate) fn sorted_keys(&mut self) -> Vec<String> {
        self.purge_expired();
        let mut keys: Vec<String> = self.data.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Every live entry with its TTL. Expired keys are purged first.
    pub(crate) fn live_entries(&mut self) -> impl Iterator<Item = (&String, &RedisValue, Option<u64>)> {
        self.purge_expired();
        let expires = &self.expires;
        self.data
            .iter()
            .map(move |(k, v)| (k, v, expires.get(k).copied()))
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn clear(&mut self) {
        self.data.clear();
        self.expires.clear();
    }

    /// Number of keys carrying a TTL.
    pub fn volatile_len(&self) -> usize {
        self.expires.len()
    }

    /// Sample up to `sample_size` keys that carry a TTL and remove the ones
    /// already past it.
    pub fn sweep_expired(&mut self, sample_size: usize) -> SweepStats {
        let mut rng = rand::thread_rng();
        let sample: Vec<String> = self
            .expires
            .keys()
            .cloned()
            .choose_multiple(&mut rng, sample_size);

        let now = self.now();
        let mut expired = 0;
        for key in &sample {
            if !self.data.contains_key(key) {
                self.expires.remove(key);
                continue;
            }
            if self.is_expired_at(key, now) {
                self.data.remove(key);
                self.expires.remove(key);
                expired += 1;
            }
        }
        self.expired_keys += expired as u64;

        SweepStats {
            sampled: sample.len(),
            expired,
        }
    }

    typed_access!(String, RedisString, string, string_mut);
    typed_access!(List, RedisList, list, list_mut, list_or_create);
    typed_access!(Hash, RedisHash, hash, hash_mut, hash_or_create);
    typed_access!(Set, RedisSet, set, set_mut, set_or_create);
    typed_access!(SortedSet, RedisSortedSet, zset, zset_mut, zset_or_create);
}

/// The store behind its one table-wide lock.
pub type SharedStore = Arc<Mutex<Store>>;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clock::ManualClock;

    pub const T0: u64 = 1_700_000_000_000;

    pub fn store_with_clock() -> (Store, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        (Store::new(clock.clone()), clock)
    }
}
