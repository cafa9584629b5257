use super::Store;
use crate::error::{KestrelError, KestrelResult};
use crate::glob::GlobPattern;

/// Generic keyspace operations (existence, TTLs, renames, iteration).
pub struct KeyOps<'a> {
    store: &'a mut Store,
}

impl<'a> KeyOps<'a> {
    pub(super) fn new(store: &'a mut Store) -> Self {
        KeyOps { store }
    }

    pub fn del(&mut self, keys: &[String]) -> usize {
        keys.iter()
            .filter(|k| self.store.remove(k).is_some())
            .count()
    }

    /// Number of the given keys that exist; repeated keys count repeatedly.
    pub fn exists(&mut self, keys: &[String]) -> usize {
        keys.iter().filter(|k| self.store.contains(k)).count()
    }

    /// Expire `key` at an absolute instant. An instant that has already
    /// passed deletes the key. Returns false if the key does not exist.
    pub fn expire_at(&mut self, key: &str, at_ms: i64) -> bool {
        if !self.store.contains(key) {
            return false;
        }
        if at_ms <= self.store.now() as i64 {
            self.store.remove(key);
            return true;
        }
        self.store.set_expiry(key, at_ms as u64)
    }

    /// Expire `key` after `ttl_ms` milliseconds from now.
    pub fn expire_in(&mut self, key: &str, ttl_ms: i64) -> bool {
        let at = (self.store.now() as i64).saturating_add(ttl_ms);
        self.expire_at(key, at)
    }

    /// Remaining time to live in milliseconds; -2 if absent, -1 if no TTL.
    pub fn pttl(&mut self, key: &str) -> i64 {
        if !self.store.contains(key) {
            return -2;
        }
        match self.store.expiry_of(key) {
            Some(at) => at.saturating_sub(self.store.now()) as i64,
            None => -1,
        }
    }

    /// Remaining time to live in whole seconds, rounded up.
    pub fn ttl(&mut self, key: &str) -> i64 {
        match self.pttl(key) {
            ms if ms < 0 => ms,
            ms => (ms + 999) / 1000,
        }
    }

    /// Drop the TTL of `key`. Returns true if there was one.
    pub fn persist(&mut self, key: &str) -> bool {
        self.store.contains(key) && self.store.clear_expiry(key)
    }

    /// Move the value and TTL of `src` to `dst`, replacing whatever `dst` held.
    pub fn rename(&mut self, src: &str, dst: &str) -> KestrelResult<()> {
        let expiry = self.store.expiry_of(src);
        let value = self.store.remove(src).ok_or(KestrelError::NoSuchKey)?;
        self.store.insert(dst, value);
        if let Some(at) = expiry {
            self.store.set_expiry(dst, at);
        }
        Ok(())
    }

    /// Type name of the value at `key`, or "none".
    pub fn key_type(&mut self, key: &str) -> &'static str {
        self.store.get_value(key).map_or("none", |v| v.type_name())
    }

    /// All live keys matching `pattern`, in byte order.
    pub fn keys(&mut self, pattern: &str) -> Vec<String> {
        let glob = GlobPattern::new(pattern.as_bytes());
        self.store
            .sorted_keys()
            .into_iter()
            .filter(|k| glob.matches(k.as_bytes()))
            .collect()
    }

    /// One step of a cursor scan. The cursor indexes into the ordered list of
    /// live keys; the returned cursor is 0 once the walk is complete.
    pub fn scan(&mut self, cursor: usize, pattern: Option<&str>, count: usize) -> (usize, Vec<String>) {
        let glob = pattern.map(|p| GlobPattern::new(p.as_bytes()));
        let keys = self.store.sorted_keys();
        if cursor >= keys.len() {
            return (0, Vec::new());
        }

        let end = cursor.saturating_add(count.max(1)).min(keys.len());
        let found = keys[cursor..end]
            .iter()
            .filter(|k| glob.as_ref().is_none_or(|g| g.matches(k.as_bytes())))
            .cloned()
            .collect();
        let next = if end >= keys.len() { 0 } else { end };
        (next, found)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::KestrelError;
    use crate::store::test_support::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_del_and_exists() {
        let (mut store, _clock) = store_with_clock();
        store.strings().set("a", b"1".to_vec());
        store.strings().set("b", b"1".to_vec());
        assert_eq!(store.keys().exists(&keys(&["a", "a", "zz"])), 2);
        assert_eq!(store.keys().del(&keys(&["a", "b", "c"])), 2);
        assert_eq!(store.keys().exists(&keys(&["a", "b"])), 0);
    }

    #[test]
    fn test_ttl_reporting() {
        let (mut store, clock) = store_with_clock();
        assert_eq!(store.keys().ttl("missing"), -2);
        store.strings().set("k", b"v".to_vec());
        assert_eq!(store.keys().ttl("k"), -1);
        assert!(store.keys().expire_in("k", 1_500));
        assert_eq!(store.keys().ttl("k"), 2);
        assert_eq!(store.keys().pttl("k"), 1_500);
        clock.advance(1_499);
        assert_eq!(store.keys().ttl("k"), 1);
        clock.advance(1);
        assert_eq!(store.keys().ttl("k"), -2);
    }

    #[test]
    fn test_expire_at_in_past_deletes() {
        let (mut store, _clock) = store_with_clock();
        store.strings().set("k", b"v".to_vec());
        assert!(store.keys().expire_at("k", (T0 - 1) as i64));
        assert_eq!(store.keys().key_type("k"), "none");
        assert!(!store.keys().expire_at("k", (T0 + 10) as i64));
    }

    #[test]
    fn test_persist() {
        let (mut store, _clock) = store_with_clock();
        store.strings().set("k", b"v".to_vec());
        assert!(!store.keys().persist("k"));
        store.keys().expire_in("k", 100);
        assert!(store.keys().persist("k"));
        assert_eq!(store.keys().ttl("k"), -1);
    }

    #[test]
    fn test_rename_moves_ttl() {
        let (mut store, _clock) = store_with_clock();
        store.strings().set("src", b"v".to_vec());
        store.keys().expire_in("src", 5_000);
        store.strings().set("dst", b"old".to_vec());
        store.keys().expire_in("dst", 99_000);

        store.keys().rename("src", "dst").unwrap();
        assert_eq!(store.strings().get("dst").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.keys().pttl("dst"), 5_000);
        assert_eq!(store.keys().key_type("src"), "none");

        store.strings().set("plain", b"p".to_vec());
        store.keys().rename("plain", "dst").unwrap();
        assert_eq!(store.keys().ttl("dst"), -1);
    }

    #[test]
    fn test_rename_missing_source() {
        let (mut store, _clock) = store_with_clock();
        assert!(matches!(store.keys().rename("nope", "x"), Err(KestrelError::NoSuchKey)));
    }

    #[test]
    fn test_key_type() {
        let (mut store, _clock) = store_with_clock();
        store.strings().set("s", b"v".to_vec());
        store.lists().rpush("l", vec![b"a".to_vec()]).unwrap();
        store.zsets().zadd("z", vec![(1.0, b"a".to_vec())]).unwrap();
        assert_eq!(store.keys().key_type("s"), "string");
        assert_eq!(store.keys().key_type("l"), "list");
        assert_eq!(store.keys().key_type("z"), "zset");
        assert_eq!(store.keys().key_type("x"), "none");
    }

    #[test]
    fn test_keys_skips_expired() {
        let (mut store, clock) = store_with_clock();
        store.strings().set("user:1", b"a".to_vec());
        store.strings().set("user:2", b"b".to_vec());
        store.strings().set("other", b"c".to_vec());
        store.keys().expire_in("user:2", 10);
        assert_eq!(store.keys().keys("user:*"), keys(&["user:1", "user:2"]));
        clock.advance(10);
        assert_eq!(store.keys().keys("user:*"), keys(&["user:1"]));
        assert_eq!(store.keys().keys("*").len(), 2);
    }

    #[test]
    fn test_scan_walks_whole_keyspace() {
        let (mut store, _clock) = store_with_clock();
        for i in 0..25 {
            store.strings().set(&format!("key:{i:02}"), b"v".to_vec());
        }
        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let (next, batch) = store.keys().scan(cursor, None, 10);
            seen.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(seen.len(), 25);
        assert_eq!(seen[0], "key:00");
    }

    #[test]
    fn test_scan_with_match() {
        let (mut store, _clock) = store_with_clock();
        store.strings().set("a1", b"v".to_vec());
        store.strings().set("b1", b"v".to_vec());
        store.strings().set("a2", b"v".to_vec());
        assert_eq!(store.keys().scan(0, Some("a*"), 10), (0, keys(&["a1", "a2"])));
        assert_eq!(store.keys().scan(99, None, 10), (0, vec![]));
    }
}
