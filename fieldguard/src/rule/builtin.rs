//! Built-in rules.

use async_trait::async_trait;
use regex::Regex;

use super::ValidationRule;
use crate::error::RuleError;

/// Valid iff the input is non-empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredRule;

impl RequiredRule {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ValidationRule for RequiredRule {
    fn message(&self) -> &str {
        "This field is required."
    }

    fn name(&self) -> &str {
        "RequiredRule"
    }

    async fn evaluate(&self, input: &str) -> Result<bool, RuleError> {
        Ok(!input.is_empty())
    }
}

/// Valid iff the input holds at least two space-separated words.
///
/// Only the space character separates words; runs of spaces do not produce
/// empty words.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullNameRule;

impl FullNameRule {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ValidationRule for FullNameRule {
    fn message(&self) -> &str {
        "First and last name are required."
    }

    fn name(&self) -> &str {
        "FullNameRule"
    }

    async fn evaluate(&self, input: &str) -> Result<bool, RuleError> {
        Ok(input.split(' ').filter(|word| !word.is_empty()).count() > 1)
    }
}

/// Valid iff the input has at least `min` characters.
#[derive(Debug, Clone)]
pub struct MinLengthRule {
    min: usize,
    message: String,
}

impl MinLengthRule {
    pub fn new(min: usize, message: impl Into<String>) -> Self {
        Self {
            min,
            message: message.into(),
        }
    }
}

#[async_trait]
impl ValidationRule for MinLengthRule {
    fn message(&self) -> &str {
        &self.message
    }

    fn name(&self) -> &str {
        "MinLengthRule"
    }

    async fn evaluate(&self, input: &str) -> Result<bool, RuleError> {
        Ok(input.chars().count() >= self.min)
    }
}

/// Valid iff the input has at most `max` characters.
#[derive(Debug, Clone)]
pub struct MaxLengthRule {
    max: usize,
    message: String,
}

impl MaxLengthRule {
    pub fn new(max: usize, message: impl Into<String>) -> Self {
        Self {
            max,
            message: message.into(),
        }
    }
}

#[async_trait]
impl ValidationRule for MaxLengthRule {
    fn message(&self) -> &str {
        &self.message
    }

    fn name(&self) -> &str {
        "MaxLengthRule"
    }

    async fn evaluate(&self, input: &str) -> Result<bool, RuleError> {
        Ok(input.chars().count() <= self.max)
    }
}

/// Valid iff the input matches a regular expression.
///
/// An empty input is valid; combine with [`RequiredRule`] to reject it.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pattern: Regex,
    message: String,
}

impl PatternRule {
    pub fn new(pattern: Regex, message: impl Into<String>) -> Self {
        Self {
            pattern,
            message: message.into(),
        }
    }

    /// Compile `pattern` and build the rule.
    pub fn parse(pattern: &str, message: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self::new(Regex::new(pattern)?, message))
    }
}

#[async_trait]
impl ValidationRule for PatternRule {
    fn message(&self) -> &str {
        &self.message
    }

    fn name(&self) -> &str {
        "PatternRule"
    }

    async fn evaluate(&self, input: &str) -> Result<bool, RuleError> {
        Ok(input.is_empty() || self.pattern.is_match(input))
    }
}

/// Valid iff the input is an email address. Empty input is valid.
#[derive(Debug, Clone)]
pub struct EmailRule {
    message: String,
}

impl EmailRule {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for EmailRule {
    fn default() -> Self {
        Self::new("Please enter a valid email address.")
    }
}

#[async_trait]
impl ValidationRule for EmailRule {
    fn message(&self) -> &str {
        &self.message
    }

    fn name(&self) -> &str {
        "EmailRule"
    }

    async fn evaluate(&self, input: &str) -> Result<bool, RuleError> {
        Ok(input.is_empty() || email_address::EmailAddress::is_valid(input))
    }
}
