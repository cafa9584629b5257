pub mod hash;
pub mod list;
pub mod rstring;
pub mod set;
pub mod sorted_set;

pub use hash::RedisHash;
pub use list::RedisList;
pub use rstring::RedisString;
pub use set::RedisSet;
pub use sorted_set::RedisSortedSet;

/// A stored value. Every typed operation matches on this exhaustively; a
/// variant it doesn't expect is a WRONGTYPE failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RedisValue {
    String(RedisString),
    List(RedisList),
    Hash(RedisHash),
    Set(RedisSet),
    SortedSet(RedisSortedSet),
}

/// Which variant a value is, without borrowing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    List,
    Hash,
    Set,
    SortedSet,
}

impl ValueKind {
    /// Name reported by TYPE.
    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Hash => "hash",
            ValueKind::Set => "set",
            ValueKind::SortedSet => "zset",
        }
    }
}

impl RedisValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            RedisValue::String(_) => ValueKind::String,
            RedisValue::List(_) => ValueKind::List,
            RedisValue::Hash(_) => ValueKind::Hash,
            RedisValue::Set(_) => ValueKind::Set,
            RedisValue::SortedSet(_) => ValueKind::SortedSet,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().type_name()
    }

    /// An empty container; strings are never considered empty.
    pub fn is_empty_container(&self) -> bool {
        match self {
            RedisValue::String(_) => false,
            RedisValue::List(l) => l.is_empty(),
            RedisValue::Hash(h) => h.is_empty(),
            RedisValue::Set(s) => s.is_empty(),
            RedisValue::SortedSet(z) => z.is_empty(),
        }
    }
}

/// Resolve a signed inclusive `[start, stop]` range against a container of
/// `len` elements. Negative indices count from the end. Returns `None` when
/// the range selects nothing.
pub fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_range(0, -1, 3), Some((0, 2)));
        assert_eq!(normalize_range(-2, -1, 3), Some((1, 2)));
        assert_eq!(normalize_range(-100, 1, 3), Some((0, 1)));
        assert_eq!(normalize_range(1, 100, 3), Some((1, 2)));
        assert_eq!(normalize_range(2, 1, 3), None);
        assert_eq!(normalize_range(5, 10, 3), None);
        assert_eq!(normalize_range(0, -5, 3), None);
        assert_eq!(normalize_range(0, -1, 0), None);
    }

    #[test]
    fn test_type_names() {
        let v = RedisValue::String(RedisString::new(b"x".to_vec()));
        assert_eq!(v.type_name(), "string");
        assert_eq!(RedisValue::SortedSet(RedisSortedSet::new()).type_name(), "zset");
        assert!(RedisValue::List(RedisList::new()).is_empty_container());
        assert!(!v.is_empty_container());
    }
}
