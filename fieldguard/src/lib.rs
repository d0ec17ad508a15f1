//! Form-field validation engine.
//!
//! Tracks named input fields, runs each field's rules concurrently,
//! aggregates the results and notifies observers of state transitions:
//! initial check, value change, validity change and submit.
//!
//! Widgets stay outside the engine. A field only has to expose its current
//! text ([`Field`]) and, to be validated, observe outcomes
//! ([`ValidatableField`]). All observer callbacks run on a single
//! [`NotifyContext`], never on the worker tasks doing the evaluation.

pub mod config;
pub mod context;
pub mod error;
pub mod field;
pub mod form;
pub mod registry;
pub mod rule;
pub mod snapshot;
pub mod validator;

pub use config::ValidatorConfig;
pub use context::{NotifyContext, NotifyQueue};
pub use error::{RegistrationError, RuleError, ValidationError};
pub use field::{ChangeHook, Field, FieldConfig, FieldHandle, FieldId, ValidatableField};
pub use form::{Form, FormDelegate};
pub use registry::FieldState;
pub use rule::{FullNameRule, RequiredRule, SharedRule, ValidationRule};
pub use snapshot::FormSnapshot;
pub use validator::{ValidationHandle, Validator, ValidatorDelegate};

pub mod prelude {
    pub use crate::config::ValidatorConfig;
    pub use crate::context::NotifyContext;
    pub use crate::error::{RegistrationError, RuleError, ValidationError};
    pub use crate::field::{ChangeHook, Field, FieldConfig, FieldId, ValidatableField};
    pub use crate::form::{Form, FormDelegate};
    pub use crate::registry::FieldState;
    pub use crate::rule::{
        self, EmailRule, FullNameRule, MaxLengthRule, MinLengthRule, PatternRule, RequiredRule,
        SharedRule, ValidationRule,
    };
    pub use crate::snapshot::FormSnapshot;
    pub use crate::validator::{ValidationHandle, Validator, ValidatorDelegate};
}
