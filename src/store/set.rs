use super::Store;
use crate::error::KestrelResult;

/// Set operations over the shared keyspace.
pub struct SetOps<'a> {
    store: &'a mut Store,
}

impl<'a> SetOps<'a> {
    pub(super) fn new(store: &'a mut Store) -> Self {
        SetOps { store }
    }

    /// Returns how many members were newly added.
    pub fn sadd(&mut self, key: &str, members: Vec<Vec<u8>>) -> KestrelResult<usize> {
        let set = self.store.set_or_create(key)?;
        Ok(members.into_iter().map(|m| set.add(m)).filter(|&added| added).count())
    }

    pub fn srem(&mut self, key: &str, members: &[Vec<u8>]) -> KestrelResult<usize> {
        let Some(set) = self.store.set_mut(key)? else {
            return Ok(0);
        };
        let removed = members.iter().filter(|m| set.remove(m)).count();
        self.store.remove_if_empty(key);
        Ok(removed)
    }

    /// Members in byte order.
    pub fn smembers(&mut self, key: &str) -> KestrelResult<Vec<Vec<u8>>> {
        let mut members: Vec<Vec<u8>> = match self.store.set(key)? {
            Some(s) => s.iter().cloned().collect(),
            None => return Ok(Vec::new()),
        };
        members.sort_unstable();
        Ok(members)
    }

    pub fn sismember(&mut self, key: &str, member: &[u8]) -> KestrelResult<bool> {
        Ok(self.store.set(key)?.is_some_and(|s| s.contains(member)))
    }

    pub fn scard(&mut self, key: &str) -> KestrelResult<usize> {
        Ok(self.store.set(key)?.map_or(0, |s| s.len()))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::KestrelError;
    use crate::store::test_support::*;

    #[test]
    fn test_sadd_dedupes() {
        let (mut store, _clock) = store_with_clock();
        let added = store
            .sets()
            .sadd("s", vec![b"a".to_vec(), b"b".to_vec(), b"a".to_vec()])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(store.sets().scard("s").unwrap(), 2);
        assert_eq!(store.sets().smembers("s").unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(store.sets().sismember("s", b"a").unwrap());
    }

    #[test]
    fn test_srem_last_member_deletes_key() {
        let (mut store, _clock) = store_with_clock();
        store.sets().sadd("s", vec![b"a".to_vec()]).unwrap();
        assert_eq!(store.sets().srem("s", &[b"a".to_vec()]).unwrap(), 1);
        assert_eq!(store.keys().exists(&["s".to_string()]), 0);
    }

    #[test]
    fn test_set_value_rejects_string_ops() {
        let (mut store, _clock) = store_with_clock();
        store.sets().sadd("s", vec![b"a".to_vec()]).unwrap();
        assert!(matches!(store.strings().get("s"), Err(KestrelError::WrongType)));
        assert!(matches!(store.strings().incr_by("s", 1), Err(KestrelError::WrongType)));
        assert_eq!(store.sets().scard("s").unwrap(), 1);
    }
}
