//! Validation rules.
//!
//! A rule is a stateless predicate over a field's text. It may be async (a
//! uniqueness check against a service, say) and may fail to produce a
//! verdict at all, which is reported as a [`RuleError`] rather than as an
//! invalid input.
//!
//! # Example
//!
//! ```ignore
//! use fieldguard::rule::{self, FullNameRule, RequiredRule};
//!
//! let rules: Vec<SharedRule> = vec![
//!     Arc::new(RequiredRule::new()),
//!     Arc::new(FullNameRule::new()),
//!     Arc::new(rule::from_fn("No digits allowed", |v| !v.chars().any(|c| c.is_ascii_digit()))),
//! ];
//! ```

mod builtin;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::RuleError;

pub use builtin::{EmailRule, FullNameRule, MaxLengthRule, MinLengthRule, PatternRule, RequiredRule};

/// A rule shared between fields, forms and in-flight evaluation tasks.
pub type SharedRule = Arc<dyn ValidationRule>;

/// A predicate deciding whether a field's text is valid.
///
/// Implementations must be free of side effects and safe to evaluate
/// concurrently and repeatedly.
#[async_trait]
pub trait ValidationRule: Send + Sync {
    /// Message shown to the user when the rule fails.
    ///
    /// Constant per rule instance.
    fn message(&self) -> &str;

    /// Name used in logs and error reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Evaluate the rule against `input`.
    ///
    /// `Ok(false)` means the input is invalid. `Err` means no verdict could
    /// be reached.
    async fn evaluate(&self, input: &str) -> Result<bool, RuleError>;
}

/// Rule backed by a synchronous closure.
pub struct FnRule<F> {
    message: String,
    check: F,
}

#[async_trait]
impl<F> ValidationRule for FnRule<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn message(&self) -> &str {
        &self.message
    }

    fn name(&self) -> &str {
        "FnRule"
    }

    async fn evaluate(&self, input: &str) -> Result<bool, RuleError> {
        Ok((self.check)(input))
    }
}

/// Type alias for async rule closures.
type AsyncCheck = Box<dyn Fn(String) -> BoxFuture<'static, Result<bool, RuleError>> + Send + Sync>;

/// Rule backed by an asynchronous, fallible closure.
pub struct AsyncFnRule {
    message: String,
    check: AsyncCheck,
}

#[async_trait]
impl ValidationRule for AsyncFnRule {
    fn message(&self) -> &str {
        &self.message
    }

    fn name(&self) -> &str {
        "AsyncFnRule"
    }

    async fn evaluate(&self, input: &str) -> Result<bool, RuleError> {
        (self.check)(input.to_owned()).await
    }
}

/// Create a rule from a synchronous predicate.
pub fn from_fn<F>(message: impl Into<String>, check: F) -> FnRule<F>
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    FnRule {
        message: message.into(),
        check,
    }
}

/// Create a rule from an async predicate that may fail.
pub fn from_async_fn<F, Fut>(message: impl Into<String>, check: F) -> AsyncFnRule
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, RuleError>> + Send + 'static,
{
    AsyncFnRule {
        message: message.into(),
        check: Box::new(move |input| Box::pin(check(input))),
    }
}

/// Collect the failure messages of `rules`, in order.
pub(crate) fn messages(rules: &[SharedRule]) -> Vec<String> {
    rules.iter().map(|rule| rule.message().to_owned()).collect()
}
