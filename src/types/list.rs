use std::collections::VecDeque;

use super::normalize_range;

/// A list of byte strings with cheap push/pop at both ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedisList {
    items: VecDeque<Vec<u8>>,
}

impl RedisList {
    pub fn new() -> Self {
        RedisList::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push_front(&mut self, value: Vec<u8>) {
        self.items.push_front(value);
    }

    pub fn push_back(&mut self, value: Vec<u8>) {
        self.items.push_back(value);
    }

    /// Pop up to `count` elements from the head.
    pub fn pop_front(&mut self, count: usize) -> Vec<Vec<u8>> {
        let n = count.min(self.items.len());
        self.items.drain(..n).collect()
    }

    /// Pop up to `count` elements from the tail, last element first.
    pub fn pop_back(&mut self, count: usize) -> Vec<Vec<u8>> {
        let n = count.min(self.items.len());
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            if let Some(v) = self.items.pop_back() {
                out.push(v);
            }
        }
        out
    }

    pub fn range(&self, start: i64, stop: i64) -> Vec<Vec<u8>> {
        match normalize_range(start, stop, self.items.len()) {
            Some((from, to)) => self.items.range(from..=to).cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.items.iter()
    }
}
