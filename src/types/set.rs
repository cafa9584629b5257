use std::collections::HashSet;

/// An unordered collection of unique byte strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedisSet {
    members: HashSet<Vec<u8>>,
}

impl RedisSet {
    pub fn new() -> Self {
        RedisSet::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns true if the member was new.
    pub fn add(&mut self, member: Vec<u8>) -> bool {
        self.members.insert(member)
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        self.members.remove(member)
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.members.contains(member)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut s = RedisSet::new();
        assert!(s.add(b"a".to_vec()));
        assert!(!s.add(b"a".to_vec()));
        assert!(s.contains(b"a"));
        assert_eq!(s.len(), 1);
        assert!(s.remove(b"a"));
        assert!(s.is_empty());
    }
}
