use super::Store;
use crate::error::KestrelResult;

/// Hash operations over the shared keyspace.
pub struct HashOps<'a> {
    store: &'a mut Store,
}

impl<'a> HashOps<'a> {
    pub(super) fn new(store: &'a mut Store) -> Self {
        HashOps { store }
    }

    /// Set field/value pairs. Returns how many fields were newly created.
    pub fn hset(&mut self, key: &str, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> KestrelResult<usize> {
        let hash = self.store.hash_or_create(key)?;
        Ok(pairs
            .into_iter()
            .map(|(f, v)| hash.set(f, v))
            .filter(|&created| created)
            .count())
    }

    pub fn hget(&mut self, key: &str, field: &[u8]) -> KestrelResult<Option<Vec<u8>>> {
        Ok(self.store.hash(key)?.and_then(|h| h.get(field).cloned()))
    }

    pub fn hdel(&mut self, key: &str, fields: &[Vec<u8>]) -> KestrelResult<usize> {
        let Some(hash) = self.store.hash_mut(key)? else {
            return Ok(0);
        };
        let removed = fields.iter().filter(|f| hash.remove(f)).count();
        self.store.remove_if_empty(key);
        Ok(removed)
    }

    pub fn hexists(&mut self, key: &str, field: &[u8]) -> KestrelResult<bool> {
        Ok(self.store.hash(key)?.is_some_and(|h| h.contains(field)))
    }

    pub fn hlen(&mut self, key: &str) -> KestrelResult<usize> {
        Ok(self.store.hash(key)?.map_or(0, |h| h.len()))
    }

    /// All field/value pairs, ordered by field.
    pub fn hgetall(&mut self, key: &str) -> KestrelResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut pairs: Vec<_> = match self.store.hash(key)? {
            Some(h) => h.iter().map(|(f, v)| (f.clone(), v.clone())).collect(),
            None => return Ok(Vec::new()),
        };
        pairs.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::KestrelError;
    use crate::store::test_support::*;

    fn pair(f: &str, v: &str) -> (Vec<u8>, Vec<u8>) {
        (f.as_bytes().to_vec(), v.as_bytes().to_vec())
    }

    #[test]
    fn test_hset_counts_new_fields() {
        let (mut store, _clock) = store_with_clock();
        assert_eq!(store.hashes().hset("h", vec![pair("f1", "v1")]).unwrap(), 1);
        assert_eq!(store.hashes().hset("h", vec![pair("f1", "v2")]).unwrap(), 0);
        assert_eq!(store.hashes().hget("h", b"f1").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(
            store.hashes().hset("h", vec![pair("f2", "x"), pair("f3", "y")]).unwrap(),
            2
        );
        assert_eq!(store.hashes().hlen("h").unwrap(), 3);
    }

    #[test]
    fn test_hdel_last_field_deletes_key() {
        let (mut store, _clock) = store_with_clock();
        store.hashes().hset("h", vec![pair("f", "v")]).unwrap();
        assert_eq!(store.hashes().hdel("h", &[b"f".to_vec(), b"g".to_vec()]).unwrap(), 1);
        assert_eq!(store.keys().key_type("h"), "none");
        assert_eq!(store.hashes().hdel("h", &[b"f".to_vec()]).unwrap(), 0);
    }

    #[test]
    fn test_hgetall_and_hexists() {
        let (mut store, _clock) = store_with_clock();
        store.hashes().hset("h", vec![pair("b", "2"), pair("a", "1")]).unwrap();
        assert_eq!(store.hashes().hgetall("h").unwrap(), vec![pair("a", "1"), pair("b", "2")]);
        assert!(store.hashes().hexists("h", b"a").unwrap());
        assert!(!store.hashes().hexists("h", b"z").unwrap());
        assert!(store.hashes().hgetall("none").unwrap().is_empty());
    }

    #[test]
    fn test_hset_on_string_keeps_ttl_and_value() {
        let (mut store, clock) = store_with_clock();
        store.strings().set_with_ttl("s", b"v".to_vec(), 5_000);
        clock.advance(1_000);
        assert!(matches!(store.hashes().hset("s", vec![pair("f", "v")]), Err(KestrelError::WrongType)));
        assert_eq!(store.keys().pttl("s"), 4_000);
        assert_eq!(store.strings().get("s").unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.keys().key_type("s"), "string");
    }

    #[test]
    fn test_wrong_type() {
        let (mut store, _clock) = store_with_clock();
        store.sets().sadd("s", vec![b"a".to_vec()]).unwrap();
        assert!(matches!(store.hashes().hset("s", vec![pair("f", "v")]), Err(KestrelError::WrongType)));
        assert!(matches!(store.hashes().hlen("s"), Err(KestrelError::WrongType)));
    }
}
