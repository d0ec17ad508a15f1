//! Form: field registration and change mediation.
//!
//! A [`Form`] owns a [`Validator`] and the registrations of all its fields,
//! plain and validatable. Each field receives a [`ChangeHook`] on
//! registration; firing it validates the field's current text and reports
//! back through the notification context.
//!
//! # Example
//!
//! ```ignore
//! let form = Form::new();
//! form.set_delegate(&delegate);
//! form.register_field(FieldConfig::validatable("name", &name).rule(RequiredRule::new()))?;
//! form.register_field(FieldConfig::plain("nickname", &nickname))?;
//!
//! // later, on submit
//! form.validate();
//! ```

use std::sync::{Arc, RwLock, Weak};

use log::{debug, trace, warn};

use crate::config::ValidatorConfig;
use crate::context::NotifyContext;
use crate::error::RegistrationError;
use crate::field::{ChangeHook, ChangeSink, FieldConfig, FieldHandle, FieldId};
use crate::registry::{FieldRegistration, FieldState, Registry};
use crate::rule::SharedRule;
use crate::snapshot::FormSnapshot;
use crate::validator::{ValidationHandle, Validator, ValidatorDelegate};

/// Observer of form submissions.
pub trait FormDelegate: Send + Sync {
    /// Fires once per [`Form::validate`] call whose validation completed.
    fn did_validate(&self, form: &Form, is_valid: bool);
}

/// A set of named fields validated together.
///
/// Cheap to clone; clones share the same registrations.
#[derive(Clone)]
pub struct Form {
    inner: Arc<FormInner>,
}

struct FormInner {
    fields: RwLock<Registry<FieldRegistration>>,
    validator: Validator,
    delegate: RwLock<Option<Weak<dyn FormDelegate>>>,
    /// Registered as the validator's delegate; forwards to ours.
    link: Arc<FormLink>,
}

struct FormLink {
    form: Weak<FormInner>,
}

impl ValidatorDelegate for FormLink {
    fn did_validate(&self, _validator: &Validator, is_valid: bool) {
        let Some(inner) = self.form.upgrade() else {
            return;
        };
        let delegate = inner
            .delegate
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().and_then(Weak::upgrade));
        if let Some(delegate) = delegate {
            delegate.did_validate(&Form { inner }, is_valid);
        }
    }
}

impl ChangeSink for FormInner {
    fn field_did_change(&self, id: FieldId) {
        let found = self.fields.read().ok().and_then(|fields| {
            fields
                .find_by_id(id)
                .map(|(name, registration)| (name.to_owned(), registration.field.clone()))
        });
        let Some((name, handle)) = found else {
            trace!("Form: change reported by unregistered field {}", id);
            return;
        };
        let FieldHandle::Validatable(field) = handle else {
            return;
        };
        let Some(field_ref) = field.upgrade() else {
            return;
        };
        let Some(stamp) = self.validator.begin_pass(&name, id) else {
            trace!("Form: '{}' is not registered for validation", name);
            return;
        };
        let input = field_ref.text();

        trace!("Form: '{}' changed", name);
        let validator = self.validator.clone();
        self.validator.runtime().spawn(async move {
            match validator.failed_rules_for(&name, &input).await {
                Ok(failed) => validator.deliver_change(name, stamp, field, failed),
                Err(err) => warn!("Form: validating change to '{}' failed: {}", name, err),
            }
        });
    }
}

impl Form {
    /// Create a form with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new() -> Self {
        Self::with_config(ValidatorConfig::default())
    }

    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self::from_validator(Validator::with_config(config))
    }

    /// Create a form that delivers notifications through `context`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn with_context(context: NotifyContext, config: ValidatorConfig) -> Self {
        Self::from_validator(Validator::with_context(context, config))
    }

    fn from_validator(validator: Validator) -> Self {
        let inner = Arc::new_cyclic(move |form| FormInner {
            fields: RwLock::new(Registry::new()),
            validator,
            delegate: RwLock::new(None),
            link: Arc::new(FormLink { form: form.clone() }),
        });
        inner.validator.set_delegate(&inner.link);
        Self { inner }
    }

    /// Set the delegate notified when a submission has been validated.
    ///
    /// The form does not keep the delegate alive.
    pub fn set_delegate<D: FormDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak = Arc::downgrade(delegate);
        let weak: Weak<dyn FormDelegate> = weak;
        if let Ok(mut slot) = self.inner.delegate.write() {
            *slot = Some(weak);
        }
    }

    pub fn clear_delegate(&self) {
        if let Ok(mut slot) = self.inner.delegate.write() {
            *slot = None;
        }
    }

    /// Register a field.
    ///
    /// The field is handed a [`ChangeHook`]. Validatable fields are also
    /// registered with the validator and get an initial check. A name that
    /// is already registered is replaced, including its hook: changes
    /// reported through the old hook are ignored. Rules given with a plain
    /// field are dropped, since plain fields are never validated.
    pub fn register_field(&self, config: FieldConfig) -> Result<FieldId, RegistrationError> {
        let FieldConfig { name, field, rules } = config;
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }

        let id = FieldId::new();
        let rules: Arc<[SharedRule]> = match &field {
            FieldHandle::Validatable(_) => rules.into(),
            FieldHandle::Plain(_) => {
                if !rules.is_empty() {
                    debug!("Form: ignoring {} rule(s) on plain field '{}'", rules.len(), name);
                }
                Arc::from(Vec::new())
            }
        };
        if let Ok(mut fields) = self.inner.fields.write() {
            fields.insert(
                name.clone(),
                FieldRegistration {
                    id,
                    field: field.clone(),
                    rules: Arc::clone(&rules),
                },
            );
        }

        match &field {
            FieldHandle::Validatable(validatable) => {
                self.inner
                    .validator
                    .register_validatable(name.clone(), id, validatable.clone(), rules);
            }
            FieldHandle::Plain(_) => self.inner.validator.forget(&name),
        }

        let sink = Arc::downgrade(&self.inner);
        let sink: Weak<dyn ChangeSink> = sink;
        field.attach(ChangeHook::new(id, sink));

        debug!("Form: registered field '{}' ({})", name, id);
        Ok(id)
    }

    /// Current text of every registered field.
    pub fn values(&self) -> FormSnapshot {
        let fields: Vec<(String, FieldHandle)> = match self.inner.fields.read() {
            Ok(fields) => fields
                .iter()
                .map(|(name, registration)| (name.to_owned(), registration.field.clone()))
                .collect(),
            Err(_) => Vec::new(),
        };
        fields
            .into_iter()
            .map(|(name, field)| (name, field.text()))
            .collect()
    }

    /// Validate the whole form against a snapshot of its current values.
    ///
    /// Runs in the background and never reports an error. Failing fields
    /// get `did_submit_form`, then the delegate gets the aggregate.
    pub fn validate(&self) -> ValidationHandle {
        let values = self.values();
        trace!("Form: validating {} value(s)", values.len());
        self.inner.validator.spawn_validate_form(values)
    }

    /// Cancel every validation started by [`validate`](Self::validate)
    /// that has not delivered yet.
    pub fn cancel_pending(&self) {
        self.inner.validator.cancel_pending();
    }

    /// Last recorded validation state of a validatable field.
    pub fn field_state(&self, name: &str) -> Option<FieldState> {
        self.inner.validator.field_state(name)
    }

    /// Rules registered for `name`, in declaration order.
    pub fn rules_for(&self, name: &str) -> Option<Vec<SharedRule>> {
        self.inner
            .fields
            .read()
            .ok()
            .and_then(|fields| fields.get(name).map(|r| r.rules.to_vec()))
    }

    /// Names of all registered fields, sorted.
    pub fn field_names(&self) -> Vec<String> {
        self.inner
            .fields
            .read()
            .map(|fields| fields.names())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .fields
            .read()
            .map(|fields| fields.get(name).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.fields.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The context observer callbacks run on.
    pub fn context(&self) -> &NotifyContext {
        self.inner.validator.context()
    }
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}
