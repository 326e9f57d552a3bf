//! `@@token@@` substitution for realized files

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Regex for `@@name@@` tokens.
static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@@([A-Za-z0-9_.\-]+)@@").expect("Invalid token regex"));

/// Replaces `@@name@@` tokens with fixed values.
///
/// Tokens without a value are left in place untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateEngine {
    tokens: BTreeMap<String, String>,
}

impl TemplateEngine {
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn with_token(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(name.into(), value.into());
        self
    }

    pub fn tokens(&self) -> &BTreeMap<String, String> {
        &self.tokens
    }

    pub fn replace_tokens(&self, text: &str) -> String {
        TOKEN_REGEX
            .replace_all(text, |caps: &Captures<'_>| match self.tokens.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

impl FromIterator<(String, String)> for TemplateEngine {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tokens_are_replaced() {
        let engine = TemplateEngine::default()
            .with_token("rhq.system.hostname", "web01")
            .with_token("port", "8080");
        assert_eq!(
            engine.replace_tokens("host=@@rhq.system.hostname@@:@@port@@"),
            "host=web01:8080"
        );
    }

    #[test]
    fn unknown_and_malformed_tokens_stay() {
        let engine = TemplateEngine::default().with_token("a", "1");
        assert_eq!(engine.replace_tokens("@@missing@@ @@a b@@ @@a@@"), "@@missing@@ @@a b@@ 1");
    }
}
