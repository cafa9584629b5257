use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use super::normalize_range;

/// Members ordered by (score, member bytes).
///
/// `scores` answers point lookups and `order` answers rank/range queries;
/// every mutation updates both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedisSortedSet {
    scores: HashMap<Vec<u8>, f64>,
    order: BTreeSet<Ranked>,
}

#[derive(Debug, Clone, PartialEq)]
struct Ranked {
    score: f64,
    member: Vec<u8>,
}

impl Eq for Ranked {}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.member.cmp(&other.member))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl RedisSortedSet {
    pub fn new() -> Self {
        RedisSortedSet::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Add a member or move it to a new score. Returns true if it was new.
    pub fn insert(&mut self, member: Vec<u8>, score: f64) -> bool {
        // -0.0 and 0.0 must rank as the same score
        let score = if score == 0.0 { 0.0 } else { score };

        match self.scores.insert(member.clone(), score) {
            Some(old) => {
                self.order.remove(&Ranked {
                    score: old,
                    member: member.clone(),
                });
                self.order.insert(Ranked { score, member });
                false
            }
            None => {
                self.order.insert(Ranked { score, member });
                true
            }
        }
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.order.remove(&Ranked {
                    score,
                    member: member.to_vec(),
                });
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Zero-based ascending rank.
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        let bound = Ranked {
            score,
            member: member.to_vec(),
        };
        Some(self.order.range(..&bound).count())
    }

    /// Members (with scores) between two signed rank indices, inclusive.
    pub fn range(&self, start: i64, stop: i64) -> Vec<(Vec<u8>, f64)> {
        match normalize_range(start, stop, self.len()) {
            Some((from, to)) => self
                .order
                .iter()
                .skip(from)
                .take(to - from + 1)
                .map(|r| (r.member.clone(), r.score))
                .collect(),
            None => Vec::new(),
        }
    }

    /// All members in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], f64)> {
        self.order.iter().map(|r| (r.member.as_slice(), r.score))
    }
}

/// Render a score for replies: integral values without a decimal point,
/// fractional values in their shortest round-tripping form.
pub fn format_score(score: f64) -> String {
    if score.is_infinite() {
        return if score > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if score.fract() == 0.0 && score.abs() < 1e17 {
        return format!("{}", score as i64);
    }
    format!("{score}")
}

/// Parse a score argument; accepts `inf`/`+inf`/`-inf`, rejects NaN.
pub fn parse_score(raw: &[u8]) -> Option<f64> {
    let s = std::str::from_utf8(raw).ok()?;
    let value = match s.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other.parse::<f64>().ok()?,
    };
    if value.is_nan() { None } else { Some(value) }
}
