//! Pattern matching for `LIKE` predicates.
//!
//! CQL and structured filters spell wildcards differently (`%`/`_` versus
//! whatever `wildCard`/`singleChar` declare), so patterns are normalized into
//! a token list at parse time. Two patterns written with different wildcard
//! characters but the same meaning compare equal.

use crate::error::CswError;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LikeToken {
    Char(char),
    /// Zero or more characters.
    AnyRun,
    /// Exactly one character.
    AnyChar,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LikePattern {
    tokens: Vec<LikeToken>,
}

impl LikePattern {
    /// Tokenizes `pattern`; a character following `escape` is always literal.
    pub fn parse(
        pattern: &str,
        wildcard: char,
        single: char,
        escape: Option<char>,
    ) -> Result<Self, CswError> {
        if wildcard == single || Some(wildcard) == escape || Some(single) == escape {
            return Err(CswError::syntax_in(
                "PropertyIsLike",
                "wildcard, single character and escape markers must differ",
            ));
        }
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            let token = if Some(c) == escape {
                // A trailing escape stands for itself.
                LikeToken::Char(chars.next().unwrap_or(c))
            } else if c == wildcard {
                LikeToken::AnyRun
            } else if c == single {
                LikeToken::AnyChar
            } else {
                LikeToken::Char(c)
            };
            tokens.push(token);
        }
        Ok(Self { tokens })
    }

    /// SQL-style pattern text (`%`, `_`, backslash escapes).
    pub fn parse_sql(pattern: &str) -> Result<Self, CswError> {
        Self::parse(pattern, '%', '_', Some('\\'))
    }

    pub fn tokens(&self) -> &[LikeToken] {
        &self.tokens
    }

    pub fn sql(&self) -> String {
        let mut out = String::with_capacity(self.tokens.len());
        for token in &self.tokens {
            match token {
                LikeToken::AnyRun => out.push('%'),
                LikeToken::AnyChar => out.push('_'),
                LikeToken::Char(c @ ('%' | '_' | '\\')) => {
                    out.push('\\');
                    out.push(*c);
                }
                LikeToken::Char(c) => out.push(*c),
            }
        }
        out
    }

    pub fn matches(&self, text: &str, match_case: bool) -> bool {
        let fold = |c: char| {
            if match_case {
                c
            } else {
                c.to_lowercase().next().unwrap_or(c)
            }
        };
        let text: Vec<char> = text.chars().map(fold).collect();
        let pattern: Vec<LikeToken> = self
            .tokens
            .iter()
            .map(|token| match token {
                LikeToken::Char(c) => LikeToken::Char(fold(*c)),
                other => *other,
            })
            .collect();

        // Greedy scan remembering the last `AnyRun` to backtrack to.
        let (mut t, mut p) = (0, 0);
        let mut resume: Option<(usize, usize)> = None;
        while t < text.len() {
            match pattern.get(p) {
                Some(LikeToken::AnyChar) => {
                    t += 1;
                    p += 1;
                }
                Some(LikeToken::Char(c)) if *c == text[t] => {
                    t += 1;
                    p += 1;
                }
                Some(LikeToken::AnyRun) => {
                    resume = Some((p, t));
                    p += 1;
                }
                _ => match resume {
                    Some((star, consumed)) => {
                        p = star + 1;
                        t = consumed + 1;
                        resume = Some((star, consumed + 1));
                    }
                    None => return false,
                },
            }
        }
        pattern[p..].iter().all(|token| *token == LikeToken::AnyRun)
    }
}

impl fmt::Display for LikePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

impl Serialize for LikePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.sql())
    }
}
