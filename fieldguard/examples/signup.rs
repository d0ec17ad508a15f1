//! Signup Example
//!
//! Simulates a user filling in a signup form:
//! - A required full name field
//! - An email field checked against a (slow) uniqueness lookup
//! - A plain nickname field that is never validated
//!
//! Notifications are printed as they arrive; engine logs go to
//! `signup.log`.

use std::fs::File;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fieldguard::prelude::*;
use log::LevelFilter;
use simplelog::{Config, WriteLogger};

// ============================================================================
// Fields
// ============================================================================

struct TextInput {
    label: &'static str,
    text: Mutex<String>,
    hook: Mutex<Option<ChangeHook>>,
}

impl TextInput {
    fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            label,
            text: Mutex::new(String::new()),
            hook: Mutex::new(None),
        })
    }

    fn type_text(&self, text: &str) {
        println!("[{}] typed {:?}", self.label, text);
        if let Ok(mut current) = self.text.lock() {
            *current = text.to_string();
        }
        let hook = self.hook.lock().ok().and_then(|h| h.clone());
        if let Some(hook) = hook {
            hook.notify();
        }
    }
}

impl Field for TextInput {
    fn text(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn attach(&self, hook: ChangeHook) {
        if let Ok(mut slot) = self.hook.lock() {
            *slot = Some(hook);
        }
    }
}

impl ValidatableField for TextInput {
    fn did_initial_validation_check(&self, is_valid: bool, messages: &[String]) {
        println!("[{}] initial check: valid={} {:?}", self.label, is_valid, messages);
    }

    fn did_change_valid_state(&self, is_valid: bool, messages: &[String]) {
        println!("[{}] now {}: {:?}", self.label, if is_valid { "valid" } else { "invalid" }, messages);
    }

    fn did_submit_form(&self, _is_valid: bool, messages: &[String]) {
        println!("[{}] rejected on submit: {:?}", self.label, messages);
    }
}

// ============================================================================
// Delegate
// ============================================================================

struct SubmitButton;

impl FormDelegate for SubmitButton {
    fn did_validate(&self, form: &Form, is_valid: bool) {
        if is_valid {
            println!("submit: sending {:?}", form.values());
        } else {
            println!("submit: form has errors");
        }
    }
}

#[tokio::main]
async fn main() {
    if let Ok(file) = File::create("signup.log") {
        let _ = WriteLogger::init(LevelFilter::Trace, Config::default(), file);
    }

    let form = Form::with_config(ValidatorConfig::new().max_concurrent_rules(4));
    let button = Arc::new(SubmitButton);
    form.set_delegate(&button);

    let name = TextInput::new("name");
    let email = TextInput::new("email");
    let nickname = TextInput::new("nickname");

    let email_is_free = rule::from_async_fn("That email is already registered.", |email| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(email != "taken@example.com")
    });

    let registered = form
        .register_field(
            FieldConfig::validatable("name", &name)
                .rule(RequiredRule::new())
                .rule(FullNameRule::new()),
        )
        .and_then(|_| {
            form.register_field(
                FieldConfig::validatable("email", &email)
                    .rule(RequiredRule::new())
                    .rule(EmailRule::default())
                    .rule(email_is_free),
            )
        })
        .and_then(|_| form.register_field(FieldConfig::plain("nickname", &nickname)));
    if let Err(err) = registered {
        eprintln!("could not build form: {}", err);
        return;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    name.type_text("Lester");
    tokio::time::sleep(Duration::from_millis(50)).await;
    email.type_text("taken@example.com");
    nickname.type_text("Les");
    tokio::time::sleep(Duration::from_millis(200)).await;

    form.validate().wait().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    name.type_text("Lester Tester");
    email.type_text("lester@example.com");
    tokio::time::sleep(Duration::from_millis(200)).await;

    form.validate().wait().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
}
