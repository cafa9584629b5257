use super::Store;
use crate::error::KestrelResult;

/// Sorted-set operations over the shared keyspace.
pub struct ZSetOps<'a> {
    store: &'a mut Store,
}

impl<'a> ZSetOps<'a> {
    pub(super) fn new(store: &'a mut Store) -> Self {
        ZSetOps { store }
    }

    /// Add members or update their scores. Returns how many were new.
    pub fn zadd(&mut self, key: &str, entries: Vec<(f64, Vec<u8>)>) -> KestrelResult<usize> {
        let zset = self.store.zset_or_create(key)?;
        Ok(entries
            .into_iter()
            .map(|(score, member)| zset.insert(member, score))
            .filter(|&added| added)
            .count())
    }

    pub fn zrem(&mut self, key: &str, members: &[Vec<u8>]) -> KestrelResult<usize> {
        let Some(zset) = self.store.zset_mut(key)? else {
            return Ok(0);
        };
        let removed = members.iter().filter(|m| zset.remove(m)).count();
        self.store.remove_if_empty(key);
        Ok(removed)
    }

    pub fn zscore(&mut self, key: &str, member: &[u8]) -> KestrelResult<Option<f64>> {
        Ok(self.store.zset(key)?.and_then(|z| z.score(member)))
    }

    pub fn zrank(&mut self, key: &str, member: &[u8]) -> KestrelResult<Option<usize>> {
        Ok(self.store.zset(key)?.and_then(|z| z.rank(member)))
    }

    pub fn zrange(&mut self, key: &str, start: i64, stop: i64) -> KestrelResult<Vec<(Vec<u8>, f64)>> {
        Ok(self
            .store
            .zset(key)?
            .map(|z| z.range(start, stop))
            .unwrap_or_default())
    }

    pub fn zcard(&mut self, key: &str) -> KestrelResult<usize> {
        Ok(self.store.zset(key)?.map_or(0, |z| z.len()))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::KestrelError;
    use crate::store::test_support::*;

    #[test]
    fn test_zadd_and_rank() {
        let (mut store, _clock) = store_with_clock();
        store.zsets().zadd("z", vec![(1.0, b"a".to_vec())]).unwrap();
        store.zsets().zadd("z", vec![(2.0, b"b".to_vec())]).unwrap();
        let members: Vec<Vec<u8>> = store
            .zsets()
            .zrange("z", 0, -1)
            .unwrap()
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(members, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(store.zsets().zrank("z", b"b").unwrap(), Some(1));
        assert_eq!(store.zsets().zrank("z", b"nope").unwrap(), None);
    }

    #[test]
    fn test_score_update_reorders() {
        let (mut store, _clock) = store_with_clock();
        store
            .zsets()
            .zadd("z", vec![(1.0, b"a".to_vec()), (2.0, b"b".to_vec())])
            .unwrap();
        assert_eq!(store.zsets().zadd("z", vec![(3.0, b"a".to_vec())]).unwrap(), 0);
        assert_eq!(store.zsets().zscore("z", b"a").unwrap(), Some(3.0));
        assert_eq!(store.zsets().zrank("z", b"a").unwrap(), Some(1));
        assert_eq!(store.zsets().zcard("z").unwrap(), 2);
    }

    #[test]
    fn test_zrem_last_member_deletes_key() {
        let (mut store, _clock) = store_with_clock();
        store.zsets().zadd("z", vec![(1.0, b"a".to_vec())]).unwrap();
        assert_eq!(store.zsets().zrem("z", &[b"a".to_vec(), b"x".to_vec()]).unwrap(), 1);
        assert_eq!(store.keys().key_type("z"), "none");
    }

    #[test]
    fn test_wrong_type() {
        let (mut store, _clock) = store_with_clock();
        store.hashes().hset("h", vec![(b"f".to_vec(), b"v".to_vec())]).unwrap();
        assert!(matches!(
            store.zsets().zadd("h", vec![(1.0, b"a".to_vec())]),
            Err(KestrelError::WrongType)
        ));
        assert_eq!(store.hashes().hlen("h").unwrap(), 1);
    }
}
