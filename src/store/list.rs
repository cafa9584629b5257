use super::Store;
use crate::error::KestrelResult;

/// List operations over the shared keyspace.
pub struct ListOps<'a> {
    store: &'a mut Store,
}

impl<'a> ListOps<'a> {
    pub(super) fn new(store: &'a mut Store) -> Self {
        ListOps { store }
    }

    /// Push each value onto the head in argument order. Returns the new length.
    pub fn lpush(&mut self, key: &str, values: Vec<Vec<u8>>) -> KestrelResult<usize> {
        let list = self.store.list_or_create(key)?;
        for v in values {
            list.push_front(v);
        }
        Ok(list.len())
    }

    pub fn rpush(&mut self, key: &str, values: Vec<Vec<u8>>) -> KestrelResult<usize> {
        let list = self.store.list_or_create(key)?;
        for v in values {
            list.push_back(v);
        }
        Ok(list.len())
    }

    /// Pop up to `count` values from the head; `None` if the key is absent.
    pub fn lpop(&mut self, key: &str, count: usize) -> KestrelResult<Option<Vec<Vec<u8>>>> {
        let Some(list) = self.store.list_mut(key)? else {
            return Ok(None);
        };
        let popped = list.pop_front(count);
        self.store.remove_if_empty(key);
        Ok(Some(popped))
    }

    pub fn rpop(&mut self, key: &str, count: usize) -> KestrelResult<Option<Vec<Vec<u8>>>> {
        let Some(list) = self.store.list_mut(key)? else {
            return Ok(None);
        };
        let popped = list.pop_back(count);
        self.store.remove_if_empty(key);
        Ok(Some(popped))
    }

    pub fn lrange(&mut self, key: &str, start: i64, stop: i64) -> KestrelResult<Vec<Vec<u8>>> {
        Ok(self
            .store
            .list(key)?
            .map(|l| l.range(start, stop))
            .unwrap_or_default())
    }

    pub fn llen(&mut self, key: &str) -> KestrelResult<usize> {
        Ok(self.store.list(key)?.map_or(0, |l| l.len()))
    }
}
