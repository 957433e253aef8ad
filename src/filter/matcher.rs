use regex::{Regex, RegexBuilder};

/// Case-insensitive pattern test against a piece of text.
pub trait PatternMatcher: Send + Sync + std::fmt::Debug {
    fn is_match(&self, haystack: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct SubstringMatcher {
    needle: String,
}

impl SubstringMatcher {
    pub fn new(pattern: &str) -> Self {
        Self {
            needle: pattern.to_lowercase(),
        }
    }
}

impl PatternMatcher for SubstringMatcher {
    fn is_match(&self, haystack: &str) -> bool {
        haystack.to_lowercase().contains(&self.needle)
    }
}

#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self { regex })
    }
}

impl PatternMatcher for RegexMatcher {
    fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

/// Which matcher family a run uses; picked once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Substring,
    Regex,
}

impl MatchMode {
    pub fn from_flag(use_regex: bool) -> Self {
        if use_regex { MatchMode::Regex } else { MatchMode::Substring }
    }

    /// Compile every pattern, stopping at the first one that is invalid.
    pub fn compile(
        self,
        patterns: &[String],
    ) -> Result<Vec<Box<dyn PatternMatcher>>, (String, regex::Error)> {
        patterns
            .iter()
            .map(|p| -> Result<Box<dyn PatternMatcher>, (String, regex::Error)> {
                match self {
                    MatchMode::Substring => Ok(Box::new(SubstringMatcher::new(p))),
                    MatchMode::Regex => RegexMatcher::new(p)
                        .map(|m| Box::new(m) as Box<dyn PatternMatcher>)
                        .map_err(|e| (p.clone(), e)),
                }
            })
            .collect()
    }
}
