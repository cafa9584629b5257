use std::collections::HashMap;

/// A field -> value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedisHash {
    fields: HashMap<Vec<u8>, Vec<u8>>,
}

impl RedisHash {
    pub fn new() -> Self {
        RedisHash::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &[u8]) -> Option<&Vec<u8>> {
        self.fields.get(field)
    }

    /// Returns true if the field did not exist before.
    pub fn set(&mut self, field: Vec<u8>, value: Vec<u8>) -> bool {
        self.fields.insert(field, value).is_none()
    }

    pub fn remove(&mut self, field: &[u8]) -> bool {
        self.fields.remove(field).is_some()
    }

    pub fn contains(&self, field: &[u8]) -> bool {
        self.fields.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Vec<u8>)> {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_reports_new_fields_only() {
        let mut h = RedisHash::new();
        assert!(h.set(b"f".to_vec(), b"1".to_vec()));
        assert!(!h.set(b"f".to_vec(), b"2".to_vec()));
        assert_eq!(h.get(b"f"), Some(&b"2".to_vec()));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut h = RedisHash::new();
        h.set(b"f".to_vec(), b"1".to_vec());
        assert!(h.remove(b"f"));
        assert!(!h.remove(b"f"));
        assert!(h.is_empty());
    }
}
