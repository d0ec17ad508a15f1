//! Name-keyed field registries.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::field::{FieldHandle, FieldId, ValidatableField};
use crate::rule::SharedRule;

/// Last known validation outcome of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldState {
    /// No validation pass has completed yet. Counts as not valid.
    #[default]
    Unvalidated,
    Valid,
    Invalid,
}

impl FieldState {
    pub fn from_valid(is_valid: bool) -> Self {
        if is_valid { Self::Valid } else { Self::Invalid }
    }

    /// Check if the last pass succeeded.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Registry entry kept by a form for every field.
#[derive(Clone)]
pub(crate) struct FieldRegistration {
    pub id: FieldId,
    pub field: FieldHandle,
    pub rules: Arc<[SharedRule]>,
}

/// Identifies one validation pass over one registration.
///
/// Passes are numbered in the order they start. A pass can only record its
/// outcome if no later pass of the same registration has recorded first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassStamp {
    pub id: FieldId,
    seq: u64,
}

/// Registry entry kept by a validator for every validatable field.
#[derive(Clone)]
pub(crate) struct ValidatableRegistration {
    pub id: FieldId,
    pub field: Weak<dyn ValidatableField>,
    pub rules: Arc<[SharedRule]>,
    state: FieldState,
    started: u64,
    recorded: u64,
}

impl ValidatableRegistration {
    pub fn new(id: FieldId, field: Weak<dyn ValidatableField>, rules: Arc<[SharedRule]>) -> Self {
        Self {
            id,
            field,
            rules,
            state: FieldState::Unvalidated,
            started: 0,
            recorded: 0,
        }
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    /// Stamp a new pass. Call when the pass reads its input.
    pub fn begin_pass(&mut self) -> PassStamp {
        self.started += 1;
        PassStamp {
            id: self.id,
            seq: self.started,
        }
    }
}

/// Map from field name to registration. Inserting an existing name replaces
/// the old entry.
pub(crate) struct Registry<T> {
    entries: BTreeMap<String, T>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert or replace the entry for `name`, returning the replaced one.
    pub fn insert(&mut self, name: impl Into<String>, entry: T) -> Option<T> {
        let name = name.into();
        let previous = self.entries.insert(name.clone(), entry);
        if previous.is_some() {
            log::debug!("Registry: replaced registration for field '{}'", name);
        }
        previous
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    /// Iterate `(name, entry)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
        self.entries
            .iter_mut()
            .map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry<FieldRegistration> {
    /// Find the registration a change event reported for.
    pub fn find_by_id(&self, id: FieldId) -> Option<(&str, &FieldRegistration)> {
        self.iter().find(|(_, registration)| registration.id == id)
    }
}

impl Registry<ValidatableRegistration> {
    /// Stamp a new pass for `name`, if it is still registered as `id`.
    pub fn begin_pass(&mut self, name: &str, id: FieldId) -> Option<PassStamp> {
        self.entries
            .get_mut(name)
            .filter(|entry| entry.id == id)
            .map(ValidatableRegistration::begin_pass)
    }

    /// Record the outcome of a validation pass and return the state it
    /// replaced.
    ///
    /// This is the only way a field's state changes. The write is skipped
    /// (and `None` returned) when `name` is unknown, now belongs to a
    /// different registration, or a pass that started later has already
    /// recorded.
    pub fn record(&mut self, name: &str, stamp: PassStamp, is_valid: bool) -> Option<FieldState> {
        let entry = self
            .entries
            .get_mut(name)
            .filter(|entry| entry.id == stamp.id && stamp.seq > entry.recorded)?;
        let previous = entry.state;
        entry.state = FieldState::from_valid(is_valid);
        entry.recorded = stamp.seq;
        Some(previous)
    }
}
