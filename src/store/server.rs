use super::Store;

/// Whole-database operations.
pub struct ServerOps<'a> {
    store: &'a mut Store,
}

impl<'a> ServerOps<'a> {
    pub(super) fn new(store: &'a mut Store) -> Self {
        ServerOps { store }
    }

    /// Number of live keys.
    pub fn dbsize(&mut self) -> usize {
        self.store.purge_expired();
        self.store.len()
    }

    pub fn flush(&mut self) {
        self.store.clear();
    }
}
