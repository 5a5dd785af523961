//! Ordered sets of compiled domain patterns.

use regex::Regex;

use crate::error::ConfigError;

/// An immutable, ordered list of compiled regular expressions.
///
/// Matching is unanchored: a pattern matches if it matches anywhere in
/// the domain, so exact rules must carry their own `^...$`.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// An empty set that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compile `patterns` in order. Fails on the first pattern that does
    /// not compile; no partial set is returned.
    pub fn compile<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| ConfigError::PatternCompile {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// First pattern, in insertion order, that matches `domain`.
    pub fn first_match(&self, domain: &str) -> Option<&Regex> {
        self.patterns.iter().find(|re| re.is_match(domain))
    }

    pub fn is_match(&self, domain: &str) -> bool {
        self.first_match(domain).is_some()
    }

    /// Source text of every pattern, in order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
