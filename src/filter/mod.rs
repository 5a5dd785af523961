//! Domain filtering.
//!
//! A domain is checked against a whitelist and then a blacklist of
//! regular expressions. The pair is installed as one immutable snapshot
//! and swapped wholesale on reload, so a classification never sees the
//! whitelist of one generation with the blacklist of another.

pub mod patterns;
pub mod source;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

pub use patterns::PatternSet;
pub use source::{FilterSources, load_pattern_file, parse_pattern_list};

/// Outcome of classifying a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked,
}

/// A whitelist and blacklist that are always used together.
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    whitelist: PatternSet,
    blacklist: PatternSet,
}

impl FilterRules {
    pub fn new(whitelist: PatternSet, blacklist: PatternSet) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }

    /// Whitelist first, then blacklist, otherwise allowed.
    pub fn classify(&self, domain: &str) -> Verdict {
        if let Some(re) = self.whitelist.first_match(domain) {
            debug!(domain, pattern = re.as_str(), "whitelisted");
            return Verdict::Allowed;
        }

        match self.blacklist.first_match(domain) {
            Some(re) => {
                debug!(domain, pattern = re.as_str(), "blacklisted");
                Verdict::Blocked
            }
            None => Verdict::Allowed,
        }
    }

    pub fn whitelist(&self) -> &PatternSet {
        &self.whitelist
    }

    pub fn blacklist(&self) -> &PatternSet {
        &self.blacklist
    }
}

/// Shared, reloadable filter.
///
/// Readers clone the current `Arc` under a read lock and match outside
/// it; writers only hold the write lock for the pointer swap. A replaced
/// pair is freed once the last reader holding it is done.
#[derive(Debug, Default)]
pub struct FilterEngine {
    rules: RwLock<Arc<FilterRules>>,
}

impl FilterEngine {
    pub fn new(rules: FilterRules) -> Self {
        Self {
            rules: RwLock::new(Arc::new(rules)),
        }
    }

    /// The pair currently installed.
    pub fn snapshot(&self) -> Arc<FilterRules> {
        self.rules.read().clone()
    }

    pub fn classify(&self, domain: &str) -> Verdict {
        self.snapshot().classify(domain)
    }

    /// Replace both pattern sets at once.
    pub fn reload(&self, whitelist: PatternSet, blacklist: PatternSet) {
        self.install(FilterRules::new(whitelist, blacklist));
    }

    /// Install an already built pair.
    pub fn install(&self, rules: FilterRules) {
        let rules = Arc::new(rules);
        let previous = std::mem::replace(&mut *self.rules.write(), rules);
        drop(previous);
    }

    /// Number of (whitelist, blacklist) patterns currently installed.
    pub fn rule_counts(&self) -> (usize, usize) {
        let rules = self.snapshot();
        (rules.whitelist.len(), rules.blacklist.len())
    }
}
