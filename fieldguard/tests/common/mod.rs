//! Shared test fixtures: recording fields and delegates.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fieldguard::prelude::*;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// A callback received by a [`TestField`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEvent {
    Initial(bool, Vec<String>),
    ChangeValue(bool, Vec<String>),
    ChangeValidState(bool, Vec<String>),
    Submit(bool, Vec<String>),
}

/// A text input that records every validation callback.
pub struct TestField {
    text: Mutex<String>,
    hook: Mutex<Option<ChangeHook>>,
    events: mpsc::UnboundedSender<FieldEvent>,
}

impl TestField {
    pub fn new(text: &str) -> (Arc<Self>, mpsc::UnboundedReceiver<FieldEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let field = Arc::new(Self {
            text: Mutex::new(text.to_string()),
            hook: Mutex::new(None),
            events: tx,
        });
        (field, rx)
    }

    /// Simulate typing: replace the text and fire the change hook.
    pub fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
        let hook = self.hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook.notify();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.hook.lock().unwrap().is_some()
    }

    fn record(&self, event: FieldEvent) {
        let _ = self.events.send(event);
    }
}

impl Field for TestField {
    fn text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    fn attach(&self, hook: ChangeHook) {
        *self.hook.lock().unwrap() = Some(hook);
    }
}

impl ValidatableField for TestField {
    fn did_initial_validation_check(&self, is_valid: bool, messages: &[String]) {
        self.record(FieldEvent::Initial(is_valid, messages.to_vec()));
    }

    fn did_change_valid_state(&self, is_valid: bool, messages: &[String]) {
        self.record(FieldEvent::ChangeValidState(is_valid, messages.to_vec()));
    }

    fn did_change_value(&self, is_valid: bool, messages: &[String]) {
        self.record(FieldEvent::ChangeValue(is_valid, messages.to_vec()));
    }

    fn did_submit_form(&self, is_valid: bool, messages: &[String]) {
        self.record(FieldEvent::Submit(is_valid, messages.to_vec()));
    }
}

/// A field that is never validated.
pub struct PlainField {
    text: Mutex<String>,
    hook: Mutex<Option<ChangeHook>>,
}

impl PlainField {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Mutex::new(text.to_string()),
            hook: Mutex::new(None),
        })
    }

    pub fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
        let hook = self.hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook.notify();
        }
    }
}

impl Field for PlainField {
    fn text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    fn attach(&self, hook: ChangeHook) {
        *self.hook.lock().unwrap() = Some(hook);
    }
}

/// Records form and validator level results.
pub struct RecordingDelegate {
    results: mpsc::UnboundedSender<bool>,
}

impl RecordingDelegate {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<bool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { results: tx }), rx)
    }
}

impl FormDelegate for RecordingDelegate {
    fn did_validate(&self, _form: &Form, is_valid: bool) {
        let _ = self.results.send(is_valid);
    }
}

impl ValidatorDelegate for RecordingDelegate {
    fn did_validate(&self, _validator: &Validator, is_valid: bool) {
        let _ = self.results.send(is_valid);
    }
}

/// Receive the next item, failing the test if none arrives in time.
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}

/// Wait until every job dispatched to `context` so far has run.
pub async fn flush(context: &NotifyContext) {
    let (tx, rx) = oneshot::channel();
    context.dispatch(move || {
        let _ = tx.send(());
    });
    timeout(WAIT, rx).await.expect("timed out flushing").expect("queue closed");
}

/// Drain everything already queued on `rx`.
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}

/// Edit `field` and wait for its `ChangeValue` notification.
///
/// Returns every event recorded for the edit, including a validity change
/// delivered in the same dispatch.
pub async fn edit(
    field: &TestField,
    rx: &mut mpsc::UnboundedReceiver<FieldEvent>,
    context: &NotifyContext,
    text: &str,
) -> Vec<FieldEvent> {
    field.set_text(text);
    let mut events = vec![next(rx).await];
    assert!(
        matches!(events[0], FieldEvent::ChangeValue(..)),
        "expected ChangeValue, got {:?}",
        events[0]
    );
    flush(context).await;
    events.extend(drain(rx));
    events
}

pub fn msgs(messages: &[&str]) -> Vec<String> {
    messages.iter().map(|m| m.to_string()).collect()
}

pub const REQUIRED: &str = "This field is required.";
pub const FULL_NAME: &str = "First and last name are required.";
