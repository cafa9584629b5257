/// Glob patterns as accepted by KEYS and SCAN MATCH.
///
/// `*` matches any run of bytes, `?` any single byte, `[abc]` / `[^abc]` /
/// `[a-z]` a byte class, and `\x` the literal byte `x`. An unterminated `[`
/// is matched literally.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobPattern {
    tokens: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(u8),
    AnyByte,
    AnyRun,
    Class { negate: bool, ranges: Vec<(u8, u8)> },
}

impl Token {
    fn accepts(&self, b: u8) -> bool {
        match self {
            Token::Literal(c) => *c == b,
            Token::AnyByte => true,
            Token::AnyRun => true,
            Token::Class { negate, ranges } => {
                let hit = ranges.iter().any(|&(lo, hi)| lo <= b && b <= hi);
                hit != *negate
            }
        }
    }
}

impl GlobPattern {
    pub fn new(pattern: &[u8]) -> Self {
        let mut tokens = Vec::new();
        let mut i = 0;
        while i < pattern.len() {
            match pattern[i] {
                b'*' => {
                    // collapse consecutive stars
                    if tokens.last() != Some(&Token::AnyRun) {
                        tokens.push(Token::AnyRun);
                    }
                    i += 1;
                }
                b'?' => {
                    tokens.push(Token::AnyByte);
                    i += 1;
                }
                b'\\' if i + 1 < pattern.len() => {
                    tokens.push(Token::Literal(pattern[i + 1]));
                    i += 2;
                }
                b'[' => match parse_class(&pattern[i..]) {
                    Some((token, used)) => {
                        tokens.push(token);
                        i += used;
                    }
                    None => {
                        tokens.push(Token::Literal(b'['));
                        i += 1;
                    }
                },
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }
        GlobPattern { tokens }
    }

    /// True if the pattern is a lone `*`.
    pub fn matches_everything(&self) -> bool {
        self.tokens == [Token::AnyRun]
    }

    pub fn matches(&self, input: &[u8]) -> bool {
        let (mut t, mut s) = (0, 0);
        // position of the last `*` and the input offset it currently covers up to
        let mut backtrack: Option<(usize, usize)> = None;

        while s < input.len() {
            match self.tokens.get(t) {
                Some(Token::AnyRun) => {
                    backtrack = Some((t, s));
                    t += 1;
                    continue;
                }
                Some(tok) if tok.accepts(input[s]) => {
                    t += 1;
                    s += 1;
                    continue;
                }
                _ => {}
            }
            match backtrack {
                Some((star, covered)) => {
                    backtrack = Some((star, covered + 1));
                    t = star + 1;
                    s = covered + 1;
                }
                None => return false,
            }
        }

        self.tokens[t..].iter().all(|tok| *tok == Token::AnyRun)
    }
}

/// Parse `[...]` at the start of `pattern`; returns the token and bytes used.
fn parse_class(pattern: &[u8]) -> Option<(Token, usize)> {
    let mut i = 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut ranges = Vec::new();
    loop {
        let c = *pattern.get(i)?;
        match c {
            b']' => return Some((Token::Class { negate, ranges }, i + 1)),
            b'\\' => {
                let lit = *pattern.get(i + 1)?;
                ranges.push((lit, lit));
                i += 2;
            }
            _ => {
                let is_range = pattern.get(i + 1) == Some(&b'-')
                    && pattern.get(i + 2).is_some_and(|&hi| hi != b']');
                if is_range {
                    let hi = pattern[i + 2];
                    ranges.push((c.min(hi), c.max(hi)));
                    i += 3;
                } else {
                    ranges.push((c, c));
                    i += 1;
                }
            }
        }
    }
}

/// One-shot match of `input` against `pattern`.
pub fn glob_match(pattern: &str, input: &str) -> bool {
    GlobPattern::new(pattern.as_bytes()).matches(input.as_bytes())
}
