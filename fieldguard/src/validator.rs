//! Concurrent rule evaluation and form-level aggregation.
//!
//! Every rule of a field runs as its own task; every field of a form runs
//! as its own task. Both fan-ins go through a [`JoinSet`], so returning
//! early on the first error (or being cancelled) aborts whatever is still
//! running.
//!
//! Results never reach observers from worker tasks. They are handed to the
//! validator's [`NotifyContext`], which runs callbacks one at a time.

use std::sync::{Arc, RwLock, Weak};

use log::{debug, trace, warn};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::{RuleLimiter, ValidatorConfig};
use crate::context::NotifyContext;
use crate::error::{RegistrationError, ValidationError};
use crate::field::{FieldConfig, FieldHandle, FieldId, ValidatableField};
use crate::registry::{FieldState, PassStamp, Registry, ValidatableRegistration};
use crate::rule::{self, SharedRule};
use crate::snapshot::FormSnapshot;

/// Observer of form-level validation results.
pub trait ValidatorDelegate: Send + Sync {
    /// A form validation finished. Called exactly once per completed
    /// (not cancelled, not failed) validation.
    fn did_validate(&self, validator: &Validator, is_valid: bool);
}

/// Runs validation rules for registered fields.
///
/// Cheap to clone; clones share registrations, delegate and notification
/// context. Dropping the last clone cancels every in-flight form
/// validation.
#[derive(Clone)]
pub struct Validator {
    inner: Arc<ValidatorInner>,
}

struct ValidatorInner {
    fields: RwLock<Registry<ValidatableRegistration>>,
    delegate: RwLock<Option<Weak<dyn ValidatorDelegate>>>,
    context: NotifyContext,
    runtime: Handle,
    limiter: Option<RuleLimiter>,
    /// Cancelled when the validator is dropped.
    shutdown: CancellationToken,
    /// Parent of every pending form validation's token. Child of
    /// `shutdown`, replaced by `cancel_pending`.
    pending: RwLock<CancellationToken>,
}

impl ValidatorInner {
    fn record(&self, name: &str, stamp: PassStamp, is_valid: bool) -> Option<FieldState> {
        self.fields.write().ok()?.record(name, stamp, is_valid)
    }

    fn form_token(&self) -> CancellationToken {
        match self.pending.read() {
            Ok(token) => token.child_token(),
            Err(_) => self.shutdown.child_token(),
        }
    }

    /// Start a pass over every registered field.
    fn jobs(&self) -> Vec<FieldJob> {
        let Ok(mut fields) = self.fields.write() else {
            return Vec::new();
        };
        fields
            .iter_mut()
            .map(|(name, registration)| FieldJob {
                name: name.to_owned(),
                stamp: registration.begin_pass(),
                field: registration.field.clone(),
                rules: Arc::clone(&registration.rules),
            })
            .collect()
    }
}

impl Drop for ValidatorInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// One field's share of a form validation.
struct FieldJob {
    name: String,
    stamp: PassStamp,
    field: Weak<dyn ValidatableField>,
    rules: Arc<[SharedRule]>,
}

struct FieldOutcome {
    job: FieldJob,
    failed: Vec<SharedRule>,
}

impl Validator {
    /// Create a validator with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new() -> Self {
        Self::with_config(ValidatorConfig::default())
    }

    /// Create a validator whose notification queue runs on the current
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_config(config: ValidatorConfig) -> Self {
        let context = NotifyContext::spawn_on(&Handle::current());
        Self::with_context(context, config)
    }

    /// Create a validator that delivers notifications through `context`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_context(context: NotifyContext, config: ValidatorConfig) -> Self {
        let shutdown = CancellationToken::new();
        let pending = shutdown.child_token();
        Self {
            inner: Arc::new(ValidatorInner {
                fields: RwLock::new(Registry::new()),
                delegate: RwLock::new(None),
                context,
                runtime: Handle::current(),
                limiter: config.limiter(),
                shutdown,
                pending: RwLock::new(pending),
            }),
        }
    }

    /// Set the delegate notified of form-level results.
    ///
    /// The validator does not keep the delegate alive.
    pub fn set_delegate<D: ValidatorDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak = Arc::downgrade(delegate);
        let weak: Weak<dyn ValidatorDelegate> = weak;
        if let Ok(mut slot) = self.inner.delegate.write() {
            *slot = Some(weak);
        }
    }

    pub fn clear_delegate(&self) {
        if let Ok(mut slot) = self.inner.delegate.write() {
            *slot = None;
        }
    }

    /// The context observer callbacks run on.
    pub fn context(&self) -> &NotifyContext {
        &self.inner.context
    }

    /// Register a validatable field and start its initial check.
    ///
    /// Re-registering a name replaces the previous registration.
    pub fn register_field(&self, config: FieldConfig) -> Result<FieldId, RegistrationError> {
        if config.name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        let FieldHandle::Validatable(field) = config.field else {
            return Err(RegistrationError::NotValidatable(config.name));
        };
        let id = FieldId::new();
        self.register_validatable(config.name, id, field, config.rules.into());
        Ok(id)
    }

    pub(crate) fn register_validatable(
        &self,
        name: String,
        id: FieldId,
        field: Weak<dyn ValidatableField>,
        rules: Arc<[SharedRule]>,
    ) {
        let input: Arc<str> = field.upgrade().map(|f| f.text()).unwrap_or_default().into();

        let mut registration = ValidatableRegistration::new(id, field.clone(), Arc::clone(&rules));
        let stamp = registration.begin_pass();
        if let Ok(mut fields) = self.inner.fields.write() {
            fields.insert(name.clone(), registration);
        }
        debug!(
            "Validator: registered field '{}' with {} rule(s)",
            name,
            rules.len()
        );

        let weak = Arc::downgrade(&self.inner);
        let context = self.inner.context.clone();
        let limiter = self.inner.limiter.clone();
        let cancel = self.inner.shutdown.child_token();

        self.inner.runtime.spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = evaluate_rules(rules, input, limiter) => result,
            };
            let failed = match result {
                Ok(failed) => failed,
                Err(err) => {
                    warn!("Validator: initial check of '{}' failed: {}", name, err);
                    return;
                }
            };

            context.dispatch(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let is_valid = failed.is_empty();
                if inner.record(&name, stamp, is_valid).is_none() {
                    trace!("Validator: initial check of '{}' is superseded, not recording", name);
                }
                if let Some(field) = field.upgrade() {
                    field.did_initial_validation_check(is_valid, &rule::messages(&failed));
                }
            });
        });
    }

    /// Drop the registration for `name`.
    pub(crate) fn forget(&self, name: &str) {
        if let Ok(mut fields) = self.inner.fields.write()
            && fields.remove(name).is_some()
        {
            debug!("Validator: forgot field '{}'", name);
        }
    }

    /// Last recorded state of `name`, if registered.
    pub fn field_state(&self, name: &str) -> Option<FieldState> {
        self.inner
            .fields
            .read()
            .ok()
            .and_then(|fields| fields.get(name).map(ValidatableRegistration::state))
    }

    /// Names of all registered fields, sorted.
    pub fn field_names(&self) -> Vec<String> {
        self.inner
            .fields
            .read()
            .map(|fields| fields.names())
            .unwrap_or_default()
    }

    /// Current text of every registered field.
    pub fn values(&self) -> FormSnapshot {
        let fields: Vec<(String, Weak<dyn ValidatableField>)> = match self.inner.fields.read() {
            Ok(fields) => fields
                .iter()
                .map(|(name, registration)| (name.to_owned(), registration.field.clone()))
                .collect(),
            Err(_) => Vec::new(),
        };
        fields
            .into_iter()
            .map(|(name, field)| {
                let text = field.upgrade().map(|f| f.text()).unwrap_or_default();
                (name, text)
            })
            .collect()
    }

    /// Evaluate every rule of `name` against `input` concurrently.
    ///
    /// Returns the failing rules in declaration order. An unknown name has
    /// no rules and therefore nothing fails. The first rule error aborts
    /// the remaining evaluations and is returned.
    pub async fn failed_rules_for(
        &self,
        name: &str,
        input: &str,
    ) -> Result<Vec<SharedRule>, ValidationError> {
        let rules = self
            .inner
            .fields
            .read()
            .ok()
            .and_then(|fields| fields.get(name).map(|r| Arc::clone(&r.rules)));
        let Some(rules) = rules else {
            trace!("Validator: no registration for '{}'", name);
            return Ok(Vec::new());
        };
        evaluate_rules(rules, Arc::from(input), self.inner.limiter.clone()).await
    }

    /// Validate every registered field against `values` and deliver the
    /// results.
    ///
    /// Fields missing from `values` are validated as `""`. Once all fields
    /// finish, the notification context records each field's validity,
    /// calls `did_submit_form` on the failing fields only, then notifies
    /// the delegate once with the aggregate. Returns the aggregate once the
    /// delivery is queued.
    ///
    /// On error nothing is delivered.
    pub async fn validate_form(&self, values: &FormSnapshot) -> Result<bool, ValidationError> {
        let jobs = self.inner.jobs();
        let cancel = self.inner.form_token();
        let (delivered, _) = oneshot::channel();
        run_form_validation(
            Arc::downgrade(&self.inner),
            jobs,
            values.clone(),
            cancel,
            delivered,
        )
        .await
    }

    /// Start [`validate_form`](Self::validate_form) in the background.
    ///
    /// The fields to validate are fixed when this is called. Errors are
    /// logged, never delivered.
    pub fn spawn_validate_form(&self, values: FormSnapshot) -> ValidationHandle {
        let jobs = self.inner.jobs();
        let cancel = self.inner.form_token();
        let weak = Arc::downgrade(&self.inner);
        let token = cancel.clone();
        let (delivered_tx, delivered) = oneshot::channel();

        let task = self.inner.runtime.spawn(async move {
            match run_form_validation(weak, jobs, values, token, delivered_tx).await {
                Ok(is_valid) => Some(is_valid),
                Err(ValidationError::Cancelled) => {
                    debug!("Validator: form validation cancelled");
                    None
                }
                Err(err) => {
                    warn!("Validator: form validation failed: {}", err);
                    None
                }
            }
        });

        ValidationHandle {
            cancel,
            task,
            delivered,
        }
    }

    /// Cancel every form validation started so far.
    pub fn cancel_pending(&self) {
        if let Ok(mut token) = self.inner.pending.write() {
            token.cancel();
            *token = self.inner.shutdown.child_token();
        }
        debug!("Validator: cancelled pending validations");
    }

    /// Deliver the outcome of validating an edit.
    ///
    /// Runs on the notification context: `did_change_value` always fires,
    /// `did_change_valid_state` only when the recorded validity flips.
    pub(crate) fn deliver_change(
        &self,
        name: String,
        stamp: PassStamp,
        field: Weak<dyn ValidatableField>,
        failed: Vec<SharedRule>,
    ) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.context.dispatch(move || {
            let Some(field) = field.upgrade() else {
                return;
            };
            let is_valid = failed.is_empty();
            let messages = rule::messages(&failed);
            field.did_change_value(is_valid, &messages);

            let Some(inner) = weak.upgrade() else {
                return;
            };
            let previous = inner.record(&name, stamp, is_valid);
            if previous.is_some_and(|state| state.is_valid() != is_valid) {
                trace!("Validator: '{}' is now {}", name, if is_valid { "valid" } else { "invalid" });
                field.did_change_valid_state(is_valid, &messages);
            }
        });
    }

    /// Start an edit pass for `name`, if it is still registered as `id`.
    pub(crate) fn begin_pass(&self, name: &str, id: FieldId) -> Option<PassStamp> {
        self.inner.fields.write().ok()?.begin_pass(name, id)
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    fn notify_delegate(&self, is_valid: bool) {
        let delegate = self
            .inner
            .delegate
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(Weak::upgrade));
        debug!("Validator: form validated, is_valid={}", is_valid);
        if let Some(delegate) = delegate {
            delegate.did_validate(self, is_valid);
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a background form validation.
///
/// Dropping the handle does not cancel the validation.
pub struct ValidationHandle {
    cancel: CancellationToken,
    task: JoinHandle<Option<bool>>,
    delivered: oneshot::Receiver<bool>,
}

impl ValidationHandle {
    /// Cancel the validation. If its results have not been delivered yet,
    /// they never will be.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the aggregate to be delivered. `None` if the validation
    /// failed or was cancelled before delivery.
    ///
    /// Resolves once the notification context has run the delivery, so
    /// with a manual context the queue must be drained for this to finish.
    pub async fn wait(self) -> Option<bool> {
        self.task.await.ok().flatten()?;
        self.delivered.await.ok()
    }
}

async fn run_form_validation(
    weak: Weak<ValidatorInner>,
    jobs: Vec<FieldJob>,
    values: FormSnapshot,
    cancel: CancellationToken,
    delivered: oneshot::Sender<bool>,
) -> Result<bool, ValidationError> {
    let (limiter, context) = {
        let Some(inner) = weak.upgrade() else {
            return Err(ValidationError::Cancelled);
        };
        (inner.limiter.clone(), inner.context.clone())
    };
    trace!("Validator: validating {} field(s)", jobs.len());

    let mut set = JoinSet::new();
    for job in jobs {
        let input: Arc<str> = Arc::from(values.value_or_empty(&job.name));
        let limiter = limiter.clone();
        set.spawn(async move {
            let failed = evaluate_rules(Arc::clone(&job.rules), input, limiter).await?;
            Ok(FieldOutcome { job, failed })
        });
    }

    let mut outcomes = tokio::select! {
        _ = cancel.cancelled() => return Err(ValidationError::Cancelled),
        outcomes = fan_in(set) => outcomes?,
    };

    // Nothing has been delivered yet; a late cancel still wins.
    if cancel.is_cancelled() {
        return Err(ValidationError::Cancelled);
    }

    outcomes.sort_by(|a, b| a.job.name.cmp(&b.job.name));
    let is_valid = outcomes.iter().all(|outcome| outcome.failed.is_empty());

    context.dispatch(move || deliver_form_outcome(weak, outcomes, is_valid, cancel, delivered));
    Ok(is_valid)
}

fn deliver_form_outcome(
    weak: Weak<ValidatorInner>,
    outcomes: Vec<FieldOutcome>,
    is_valid: bool,
    cancel: CancellationToken,
    delivered: oneshot::Sender<bool>,
) {
    if cancel.is_cancelled() {
        debug!("Validator: form validation cancelled before delivery");
        return;
    }
    let Some(inner) = weak.upgrade() else {
        return;
    };

    for FieldOutcome { job, failed } in &outcomes {
        let field_valid = failed.is_empty();
        inner.record(&job.name, job.stamp, field_valid);
        if field_valid {
            continue;
        }
        if let Some(field) = job.field.upgrade() {
            field.did_submit_form(false, &rule::messages(failed));
        }
    }

    Validator { inner }.notify_delegate(is_valid);
    let _ = delivered.send(is_valid);
}

/// Evaluate `rules` against `input`, one task per rule.
///
/// Returns the failing rules in declaration order regardless of which
/// evaluation finished first.
async fn evaluate_rules(
    rules: Arc<[SharedRule]>,
    input: Arc<str>,
    limiter: Option<RuleLimiter>,
) -> Result<Vec<SharedRule>, ValidationError> {
    if rules.is_empty() {
        return Ok(Vec::new());
    }

    let mut set = JoinSet::new();
    for (index, rule) in rules.iter().enumerate() {
        let rule = Arc::clone(rule);
        let input = Arc::clone(&input);
        let limiter = limiter.clone();
        set.spawn(async move {
            let _permit = match &limiter {
                Some(limiter) => limiter.acquire().await,
                None => None,
            };
            match rule.evaluate(&input).await {
                Ok(passed) => Ok((index, passed)),
                Err(source) => Err(ValidationError::Rule {
                    rule: rule.name().to_owned(),
                    source,
                }),
            }
        });
    }

    let verdicts = fan_in(set).await?;
    let mut passed = vec![true; rules.len()];
    for (index, verdict) in verdicts {
        passed[index] = verdict;
    }

    Ok(rules
        .iter()
        .zip(passed)
        .filter(|(_, passed)| !passed)
        .map(|(rule, _)| Arc::clone(rule))
        .collect())
}

/// Collect every task's result, stopping at the first error.
///
/// Returning early drops `set`, which aborts the tasks still running.
async fn fan_in<T: Send + 'static>(
    mut set: JoinSet<Result<T, ValidationError>>,
) -> Result<Vec<T>, ValidationError> {
    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        results.push(joined??);
    }
    Ok(results)
}
