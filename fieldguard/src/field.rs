//! Field handles and the observer contract fields implement.
//!
//! Fields belong to the UI layer. The engine only ever holds a [`Weak`]
//! reference to them: a field that has been dropped reads as empty text and
//! stops receiving notifications.

use std::sync::{Arc, Weak};

use uuid::Uuid;

use crate::rule::{SharedRule, ValidationRule};

/// Unique identifier for a field registration.
///
/// A fresh id is minted every time a field is registered, so a change
/// reported by a field whose registration was overwritten resolves to
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(Uuid);

impl FieldId {
    /// Create a new unique field ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FieldId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An input source with current text and a change signal.
pub trait Field: Send + Sync {
    /// Current text of the field.
    fn text(&self) -> String;

    /// Receive the hook to fire whenever the field's text changes.
    ///
    /// Called once per registration. Fields that never change can ignore it.
    fn attach(&self, hook: ChangeHook) {
        let _ = hook;
    }
}

/// A field that observes its own validation outcomes.
///
/// Every callback defaults to a no-op, so implementing any subset is valid.
/// Callbacks run on the notification context, one at a time.
pub trait ValidatableField: Field {
    /// The first validation pass after registration completed.
    fn did_initial_validation_check(&self, is_valid: bool, messages: &[String]) {
        let _ = (is_valid, messages);
    }

    /// Validity flipped since the last recorded validation pass.
    fn did_change_valid_state(&self, is_valid: bool, messages: &[String]) {
        let _ = (is_valid, messages);
    }

    /// An edit was validated. Fires for every edit.
    fn did_change_value(&self, is_valid: bool, messages: &[String]) {
        let _ = (is_valid, messages);
    }

    /// The form was submitted and this field failed.
    fn did_submit_form(&self, is_valid: bool, messages: &[String]) {
        let _ = (is_valid, messages);
    }
}

/// Receiver of change events fired through a [`ChangeHook`].
pub(crate) trait ChangeSink: Send + Sync {
    fn field_did_change(&self, id: FieldId);
}

/// Change signal handed to a field on registration.
///
/// Cloneable and cheap; fire it from any thread after the field's text
/// changed. Firing after the owning form was dropped does nothing.
#[derive(Clone)]
pub struct ChangeHook {
    id: FieldId,
    sink: Weak<dyn ChangeSink>,
}

impl ChangeHook {
    pub(crate) fn new(id: FieldId, sink: Weak<dyn ChangeSink>) -> Self {
        Self { id, sink }
    }

    /// Report that the field's text changed.
    pub fn notify(&self) {
        if let Some(sink) = self.sink.upgrade() {
            sink.field_did_change(self.id);
        }
    }

    /// The registration this hook reports for.
    pub fn field_id(&self) -> FieldId {
        self.id
    }
}

impl std::fmt::Debug for ChangeHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeHook").field("id", &self.id).finish()
    }
}

/// A non-owning field reference, tagged with the field's capability.
#[derive(Clone)]
pub enum FieldHandle {
    /// Contributes a value but is never validated.
    Plain(Weak<dyn Field>),
    /// Validated, and notified of outcomes.
    Validatable(Weak<dyn ValidatableField>),
}

impl FieldHandle {
    pub fn plain<F: Field + 'static>(field: &Arc<F>) -> Self {
        let weak = Arc::downgrade(field);
        let weak: Weak<dyn Field> = weak;
        Self::Plain(weak)
    }

    pub fn validatable<F: ValidatableField + 'static>(field: &Arc<F>) -> Self {
        let weak = Arc::downgrade(field);
        let weak: Weak<dyn ValidatableField> = weak;
        Self::Validatable(weak)
    }

    /// Current text, or `""` if the field is gone.
    pub fn text(&self) -> String {
        let text = match self {
            Self::Plain(field) => field.upgrade().map(|f| f.text()),
            Self::Validatable(field) => field.upgrade().map(|f| f.text()),
        };
        text.unwrap_or_default()
    }

    pub(crate) fn attach(&self, hook: ChangeHook) {
        match self {
            Self::Plain(field) => {
                if let Some(field) = field.upgrade() {
                    field.attach(hook);
                }
            }
            Self::Validatable(field) => {
                if let Some(field) = field.upgrade() {
                    field.attach(hook);
                }
            }
        }
    }

    pub fn is_validatable(&self) -> bool {
        matches!(self, Self::Validatable(_))
    }
}

impl std::fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("FieldHandle::Plain"),
            Self::Validatable(_) => f.write_str("FieldHandle::Validatable"),
        }
    }
}

/// Everything needed to register a field.
///
/// # Example
///
/// ```ignore
/// let config = FieldConfig::validatable("name", &name_field)
///     .rule(RequiredRule::new())
///     .rule(FullNameRule::new());
/// form.register_field(config)?;
/// ```
#[derive(Clone)]
pub struct FieldConfig {
    /// Registry key. Must be non-empty.
    pub name: String,
    /// The field itself.
    pub field: FieldHandle,
    /// Rules in declaration order.
    pub rules: Vec<SharedRule>,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, field: FieldHandle) -> Self {
        Self {
            name: name.into(),
            field,
            rules: Vec::new(),
        }
    }

    /// Config for a field that is never validated.
    pub fn plain<F: Field + 'static>(name: impl Into<String>, field: &Arc<F>) -> Self {
        Self::new(name, FieldHandle::plain(field))
    }

    /// Config for a field that observes validation outcomes.
    pub fn validatable<F: ValidatableField + 'static>(
        name: impl Into<String>,
        field: &Arc<F>,
    ) -> Self {
        Self::new(name, FieldHandle::validatable(field))
    }

    /// Append a rule.
    pub fn rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Append an already shared rule.
    pub fn shared_rule(mut self, rule: SharedRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append several shared rules.
    pub fn rules(mut self, rules: impl IntoIterator<Item = SharedRule>) -> Self {
        self.rules.extend(rules);
        self
    }
}

impl std::fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldConfig")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish()
    }
}
