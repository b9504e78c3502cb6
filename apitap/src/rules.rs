use crate::{
    data::HeaderList,
    error::{Error, Result},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

/// Method filter of a rule: every verb, or one exact verb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleMethod {
    All,
    Exact(String),
}

impl RuleMethod {
    pub fn accepts(&self, method: &str) -> bool {
        match self {
            RuleMethod::All => true,
            RuleMethod::Exact(verb) => verb.eq_ignore_ascii_case(method),
        }
    }
}

impl Default for RuleMethod {
    fn default() -> Self {
        RuleMethod::All
    }
}

impl From<String> for RuleMethod {
    fn from(method: String) -> Self {
        if method.is_empty() || method.eq_ignore_ascii_case("ALL") {
            RuleMethod::All
        } else {
            RuleMethod::Exact(method.to_uppercase())
        }
    }
}

impl From<&str> for RuleMethod {
    fn from(method: &str) -> Self {
        RuleMethod::from(String::from(method))
    }
}

impl From<RuleMethod> for String {
    fn from(method: RuleMethod) -> Self {
        method.to_string()
    }
}

impl fmt::Display for RuleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleMethod::All => write!(f, "ALL"),
            RuleMethod::Exact(verb) => write!(f, "{}", verb),
        }
    }
}

/// A compiled url pattern.
///
/// `*` is the only special token and stands for any sequence of characters; a pattern
/// containing it must match the whole url. Every other character is literal. Patterns
/// without `*` match any url that contains them.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Contains(String),
    Wildcard(Regex),
}

impl UrlPattern {
    pub fn compile(pattern: &str) -> Result<Self> {
        if !pattern.contains('*') {
            return Ok(UrlPattern::Contains(pattern.into()));
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        Regex::new(&format!("^{}$", body))
            .map(UrlPattern::Wildcard)
            .map_err(|e| Error::InvalidPattern {
                pattern: pattern.into(),
                reason: e.to_string(),
            })
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Contains(needle) => url.contains(needle.as_str()),
            UrlPattern::Wildcard(regex) => regex.is_match(url),
        }
    }
}

impl TryFrom<&str> for UrlPattern {
    type Error = Error;

    fn try_from(pattern: &str) -> Result<Self> {
        UrlPattern::compile(pattern)
    }
}

/// Common view over rule kinds the matcher can select from.
pub trait MatchRule {
    fn id(&self) -> &str;
    fn url_pattern(&self) -> &str;
    fn method(&self) -> &RuleMethod;
    fn enabled(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRule {
    pub id: String,
    pub url_pattern: String,
    #[serde(default)]
    pub method: RuleMethod,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub response_body: String,
    #[serde(default)]
    pub response_headers: HeaderList,
    pub enabled: bool,
}

impl MockRule {
    pub fn new<S1: Into<String>, S2: Into<String>>(id: S1, url_pattern: S2) -> Self {
        Self {
            id: id.into(),
            url_pattern: url_pattern.into(),
            method: RuleMethod::All,
            status: 200,
            status_text: String::from("OK"),
            response_body: String::from("{}"),
            response_headers: HeaderList::new(),
            enabled: true,
        }
    }

    pub fn with_method<M: Into<RuleMethod>>(mut self, method: M) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_body<S: Into<String>>(mut self, body: S) -> Self {
        self.response_body = body.into();
        self
    }

    pub fn with_header<S1: Into<String>, S2: Into<String>>(mut self, name: S1, value: S2) -> Self {
        self.response_headers.set(name, value);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl MatchRule for MockRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn url_pattern(&self) -> &str {
        &self.url_pattern
    }

    fn method(&self) -> &RuleMethod {
        &self.method
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointRule {
    pub id: String,
    pub url_pattern: String,
    #[serde(default)]
    pub method: RuleMethod,
    pub enabled: bool,
}

impl BreakpointRule {
    pub fn new<S1: Into<String>, S2: Into<String>>(id: S1, url_pattern: S2) -> Self {
        Self {
            id: id.into(),
            url_pattern: url_pattern.into(),
            method: RuleMethod::All,
            enabled: true,
        }
    }

    pub fn with_method<M: Into<RuleMethod>>(mut self, method: M) -> Self {
        self.method = method.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl MatchRule for BreakpointRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn url_pattern(&self) -> &str {
        &self.url_pattern
    }

    fn method(&self) -> &RuleMethod {
        &self.method
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Returns the first enabled rule, in list order, whose method and url pattern both
/// accept the call.
pub fn find_matching_rule<'a, R: MatchRule>(
    url: &str,
    method: &str,
    rules: &'a [R],
) -> Option<&'a R> {
    rules.iter().find(|rule| {
        rule.enabled()
            && rule.method().accepts(method)
            && UrlPattern::compile(rule.url_pattern())
                .map(|pattern| pattern.matches(url))
                .unwrap_or(false)
    })
}

/// An ordered rule snapshot with every pattern compiled up front.
#[derive(Debug, Clone)]
pub struct RuleSet<R> {
    rules: Vec<R>,
    patterns: Vec<UrlPattern>,
}

impl<R: MatchRule> RuleSet<R> {
    pub fn new(rules: Vec<R>) -> Result<Self> {
        let patterns = rules
            .iter()
            .map(|rule| UrlPattern::compile(rule.url_pattern()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules, patterns })
    }

    pub fn find(&self, url: &str, method: &str) -> Option<&R> {
        self.rules
            .iter()
            .zip(self.patterns.iter())
            .find(|(rule, pattern)| {
                rule.enabled() && rule.method().accepts(method) && pattern.matches(url)
            })
            .map(|(rule, _)| rule)
    }

    pub fn rules(&self) -> &[R] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<R> Default for RuleSet<R> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            patterns: Vec::new(),
        }
    }
}
