//! Short name pools

use crate::{GuardError, Result};
use regex::RegexSet;
use std::collections::{HashSet, VecDeque};

const FIRST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const OTHER_CHARS: &[u8] = b"0123456789_abcdefghijklmnopqrstuvwxyz";

/// Names no file may carry on Windows.
const RESERVED_NAMES: &[&str] = &["con", "prn", "aux", "nul"];

/// Names that must never be minted, as full-match regular expressions.
#[derive(Debug, Clone)]
pub struct NameBlacklist {
    rules: Vec<String>,
    set: RegexSet,
}

impl NameBlacklist {
    /// Compiles the blacklist patterns, each anchored to the whole name.
    pub fn new<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let rules: Vec<String> = rules.iter().map(|r| r.as_ref().to_string()).collect();
        let anchored = rules.iter().map(|r| format!("^(?:{})$", r));
        let set = RegexSet::new(anchored).map_err(|e| {
            let rule = rules
                .iter()
                .find(|r| regex::Regex::new(r).is_err())
                .cloned()
                .unwrap_or_else(|| rules.join(", "));
            GuardError::InvalidPattern {
                rule,
                reason: e.to_string(),
            }
        })?;
        Ok(Self { rules, set })
    }

    /// Blacklist that blocks nothing.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// The patterns as given.
    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// Whether `name` matches any pattern.
    pub fn is_blocked(&self, name: &str) -> bool {
        self.set.is_match(name)
    }
}

impl Default for NameBlacklist {
    fn default() -> Self {
        Self::empty()
    }
}

/// Ordered pool of candidate short names for one naming scope.
///
/// Candidates are `a`..`z`, then two characters, then three characters,
/// where every character after the first is a digit, `_` or a letter.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    scope: String,
    pool: VecDeque<String>,
}

impl NameGenerator {
    /// Number of names a fresh pool holds before any filtering.
    pub const CAPACITY: usize = 26 + 26 * 37 + 26 * 37 * 37;

    /// Creates an empty generator; call [`reset`](Self::reset) to fill it.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            pool: VecDeque::new(),
        }
    }

    /// Names still available.
    pub fn remaining(&self) -> usize {
        self.pool.len()
    }

    /// Refills the pool in generation order, skipping blacklisted names.
    pub fn reset(&mut self, blacklist: &NameBlacklist) {
        self.pool.clear();
        for &a in FIRST_CHARS {
            let name = (a as char).to_string();
            if !blacklist.is_blocked(&name) {
                self.pool.push_back(name);
            }
        }
        for &a in FIRST_CHARS {
            for &b in OTHER_CHARS {
                let name: String = [a as char, b as char].iter().collect();
                if !blacklist.is_blocked(&name) {
                    self.pool.push_back(name);
                }
            }
        }
        for &a in FIRST_CHARS {
            for &b in OTHER_CHARS {
                for &c in OTHER_CHARS {
                    let name: String = [a as char, b as char, c as char].iter().collect();
                    if !RESERVED_NAMES.contains(&name.as_str()) && !blacklist.is_blocked(&name) {
                        self.pool.push_back(name);
                    }
                }
            }
        }
    }

    /// Strikes the given names from the pool.
    pub fn remove_strings<I, S>(&mut self, exclude: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let exclude: HashSet<String> = exclude.into_iter().map(|s| s.as_ref().to_string()).collect();
        if !exclude.is_empty() {
            self.pool.retain(|name| !exclude.contains(name));
        }
    }

    /// Takes the first pooled name that is not in `in_use`.
    pub fn get_replace_string(&mut self, in_use: &HashSet<String>) -> Result<String> {
        let position = self.pool.iter().position(|name| !in_use.contains(name));
        match position.and_then(|idx| self.pool.remove(idx)) {
            Some(name) => Ok(name),
            None => Err(GuardError::Exhausted {
                scope: self.scope.clone(),
                limit: Self::CAPACITY,
            }),
        }
    }
}
