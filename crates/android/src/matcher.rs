//! Anchor matching over plain build-script text

use regex::Regex;
use seva_core::error::Result;
use std::fmt;

/// Where a patch attaches inside a file
#[derive(Debug, Clone)]
pub enum Anchor {
    /// Exact substring
    Literal(String),
    /// Regular expression
    Pattern(Regex),
}

impl Anchor {
    /// Exact substring anchor
    pub fn literal(text: impl Into<String>) -> Self {
        Anchor::Literal(text.into())
    }

    /// Compile a regex anchor
    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Anchor::Pattern(Regex::new(pattern)?))
    }

    /// The literal text, if this anchor has one
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Anchor::Literal(text) => Some(text),
            Anchor::Pattern(_) => None,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Literal(text) => f.write_str(text),
            Anchor::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// First match of an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMatch {
    /// Byte offset of the match start
    pub start: usize,
    /// Byte offset just past the match
    pub end: usize,
    /// Total matches in the text
    pub occurrences: usize,
}

/// Locate the first occurrence of `anchor` in `contents`
pub fn find_anchor(contents: &str, anchor: &Anchor) -> Option<AnchorMatch> {
    match anchor {
        Anchor::Literal(text) if text.is_empty() => None,
        Anchor::Literal(text) => {
            let start = contents.find(text.as_str())?;
            Some(AnchorMatch {
                start,
                end: start + text.len(),
                occurrences: contents.matches(text.as_str()).count(),
            })
        }
        Anchor::Pattern(re) => {
            let first = re.find(contents)?;
            Some(AnchorMatch {
                start: first.start(),
                end: first.end(),
                occurrences: re.find_iter(contents).count(),
            })
        }
    }
}
