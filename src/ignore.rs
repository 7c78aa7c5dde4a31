//! Compiles an archive's ignore rule set into a predicate over paths
//! (§4.1). Three dialects, chosen by the rule's first character:
//!
//! 1. no `/` -- matches any file whose basename equals the rule
//! 2. starts with `/` -- matches exactly that path relative to the root
//! 3. otherwise -- matches any file whose canonical path *ends with* it
//!
//! This is deliberately not glob matching (an explicit Non-goal).

use camino::{Utf8Path, Utf8PathBuf};

#[derive(Debug, Clone)]
enum Rule {
    Basename(String),
    AbsoluteFromRoot(Utf8PathBuf),
    Suffix(String),
}

impl Rule {
    fn compile(rule: &str) -> Self {
        if let Some(rest) = rule.strip_prefix('/') {
            Rule::AbsoluteFromRoot(Utf8PathBuf::from(rest.trim_end_matches('/')))
        } else if rule.contains('/') {
            Rule::Suffix(rule.trim_end_matches('/').to_string())
        } else {
            Rule::Basename(rule.to_string())
        }
    }

    fn matches(&self, relative_path: &Utf8Path) -> bool {
        match self {
            Rule::Basename(name) => relative_path.file_name() == Some(name.as_str()),
            Rule::AbsoluteFromRoot(path) => relative_path == path,
            Rule::Suffix(suffix) => relative_path.as_str().ends_with(suffix.as_str()),
        }
    }
}

/// A compiled ignore predicate. Matching is a disjunction across all
/// compiled rules; rule order doesn't matter.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    rules: Vec<Rule>,
}

impl IgnoreMatcher {
    /// Compiles `rules` (as read from an ignore file, one per line) plus
    /// the always-present `.hoard` control-directory exclusion.
    pub fn compile<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled: Vec<Rule> = rules
            .into_iter()
            .map(|r| Rule::compile(r.as_ref()))
            .collect();
        compiled.push(Rule::compile(".hoard"));
        Self { rules: compiled }
    }

    /// `relative_path` is expressed relative to the working root, matching
    /// what the walker hands every stat.
    pub fn is_ignored(&self, relative_path: &Utf8Path) -> bool {
        self.rules.iter().any(|r| r.matches(relative_path))
    }
}

/// Parses an ignore file's text: blank lines and `#`-comments are
/// stripped.
pub fn parse_rules(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
