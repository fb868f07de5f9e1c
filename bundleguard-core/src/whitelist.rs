//! Glob-like rules for resource names and archive paths
//!
//! Rules use a small wildcard language: `.` is a literal dot, `?` an optional
//! single character, `*` zero or more characters and `+` one or more. Every
//! other character is kept as a regular expression character. A rule must
//! match the whole name.

use crate::{GuardError, Result};
use regex::RegexSet;

/// Prefix of resources that belong to the platform.
pub const ANDROID_PREFIX: &str = "android:";

/// Translates a rule into an unanchored regular expression.
pub fn convert_to_pattern(rule: &str) -> String {
    let mut pattern = String::with_capacity(rule.len() * 2);
    for c in rule.chars() {
        match c {
            '.' => pattern.push_str("\\."),
            '?' => pattern.push_str(".?"),
            '*' => pattern.push_str(".*"),
            '+' => pattern.push_str(".+"),
            other => pattern.push(other),
        }
    }
    pattern
}

/// Compiled set of rules.
#[derive(Debug, Clone)]
pub struct WhitelistMatcher {
    rules: Vec<String>,
    set: RegexSet,
}

impl WhitelistMatcher {
    /// Compiles the whitelist rules; an invalid rule is a configuration error.
    pub fn new<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let rules: Vec<String> = rules.iter().map(|r| r.as_ref().trim().to_string()).collect();
        let mut patterns = Vec::with_capacity(rules.len());
        for rule in &rules {
            let pattern = format!("^(?:{})$", convert_to_pattern(rule));
            // Compile one by one so the error names the offending rule.
            regex::Regex::new(&pattern).map_err(|e| GuardError::InvalidPattern {
                rule: rule.clone(),
                reason: e.to_string(),
            })?;
            patterns.push(pattern);
        }
        let set = RegexSet::new(&patterns).map_err(|e| GuardError::InvalidPattern {
            rule: rules.join(", "),
            reason: e.to_string(),
        })?;
        Ok(Self { rules, set })
    }

    /// Whitelist exempting nothing.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// The rules as given.
    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    /// True when no rule is configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True for platform resources and for anything a rule matches.
    pub fn should_exempt(&self, name: &str) -> bool {
        name.starts_with(ANDROID_PREFIX) || self.set.is_match(name)
    }

    /// First rule matching `name`, ignoring the platform prefix.
    pub fn matched_rule(&self, name: &str) -> Option<&str> {
        self.set
            .matches(name)
            .iter()
            .next()
            .map(|idx| self.rules[idx].as_str())
    }
}

impl Default for WhitelistMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_wildcards() {
        assert_eq!(convert_to_pattern("*.R.drawable.ic_?"), ".*\\.R\\.drawable\\.ic_.?");
        assert_eq!(convert_to_pattern("res/raw/+"), "res/raw/.+");
    }

    #[test]
    fn test_full_match_semantics() {
        let matcher = WhitelistMatcher::new(&["*.R.drawable.ic_launcher", "*.R.string.+"]).unwrap();
        assert!(matcher.should_exempt("com.app.R.drawable.ic_launcher"));
        assert!(!matcher.should_exempt("com.app.R.drawable.ic_launcher_round"));
        assert!(!matcher.should_exempt("com.app.R.drawable.icon_large"));
        assert!(matcher.should_exempt("com.app.R.string.title"));
        assert!(!matcher.should_exempt("com.app.R.string."));
        assert_eq!(
            matcher.matched_rule("com.app.R.string.title"),
            Some("*.R.string.+")
        );
    }

    #[test]
    fn test_dot_is_literal_and_question_mark_optional() {
        let matcher = WhitelistMatcher::new(&["res/a?b.png"]).unwrap();
        assert!(matcher.should_exempt("res/ab.png"));
        assert!(matcher.should_exempt("res/axb.png"));
        assert!(!matcher.should_exempt("res/ab_png"));
    }

    #[test]
    fn test_platform_resources_are_always_exempt() {
        let matcher = WhitelistMatcher::empty();
        assert!(matcher.should_exempt("android:color/white"));
        assert!(!matcher.should_exempt("com.app.R.color.white"));
        assert_eq!(matcher.matched_rule("android:color/white"), None);
    }

    #[test]
    fn test_invalid_rule_is_reported() {
        let err = WhitelistMatcher::new(&["res/[a.png"]).unwrap_err();
        assert!(matches!(err, GuardError::InvalidPattern { ref rule, .. } if rule == "res/[a.png"));
    }
}
