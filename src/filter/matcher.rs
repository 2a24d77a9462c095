use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// How a match filter compares its pattern with a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchType {
    /// Case-sensitive full-string equality
    #[default]
    Exact,
    /// Glob pattern: `*` any run of characters, `?` any single character
    Wildcard,
    /// Regular expression that must match the whole field
    Regex,
}

impl MatchType {
    pub const ALL: [MatchType; 3] = [MatchType::Exact, MatchType::Wildcard, MatchType::Regex];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "Exact",
            MatchType::Wildcard => "Wildcard",
            MatchType::Regex => "Regex",
        }
    }

    /// Integer code used by grid editors (0 = Exact, 1 = Wildcard, 2 = Regex)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MatchType::Exact),
            1 => Some(MatchType::Wildcard),
            2 => Some(MatchType::Regex),
            _ => None,
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown match type: '{0}'. Valid types are: Exact, Wildcard, Regex")]
pub struct UnknownMatchType(pub String);

impl FromStr for MatchType {
    type Err = UnknownMatchType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Exact" => Ok(MatchType::Exact),
            "Wildcard" => Ok(MatchType::Wildcard),
            "Regex" => Ok(MatchType::Regex),
            other => other
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(MatchType::from_code)
                .ok_or_else(|| UnknownMatchType(s.to_string())),
        }
    }
}

/// A pattern compiled for one match type
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Pattern(Regex),
    /// Pattern that failed to compile; never matches
    Invalid,
}

impl Matcher {
    pub fn compile(match_type: MatchType, pattern: &str) -> Self {
        let source = match match_type {
            MatchType::Exact => return Matcher::Exact(pattern.to_string()),
            MatchType::Wildcard => wildcard_to_regex(pattern),
            MatchType::Regex => {
                // the bare pattern must compile, or a stray `)` could escape the anchors
                if let Err(err) = Regex::new(pattern) {
                    warn!(%match_type, pattern, error = %err, "invalid match pattern");
                    return Matcher::Invalid;
                }
                format!("^(?:{pattern})$")
            }
        };

        match Regex::new(&source) {
            Ok(re) => Matcher::Pattern(re),
            Err(err) => {
                warn!(%match_type, pattern, error = %err, "invalid match pattern");
                Matcher::Invalid
            }
        }
    }

    pub fn is_match(&self, field: &str) -> bool {
        match self {
            Matcher::Exact(expected) => expected == field,
            Matcher::Pattern(re) => re.is_match(field),
            Matcher::Invalid => false,
        }
    }
}

/// Translate a glob into an anchored regular expression
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut literal = String::new();

    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }

    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}
