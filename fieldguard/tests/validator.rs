//! Validator fan-out/fan-in behaviour.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use fieldguard::prelude::*;

fn failing(message: &'static str, delay_ms: u64) -> SharedRule {
    Arc::new(rule::from_async_fn(message, move |_| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(false)
    }))
}

fn messages(rules: &[SharedRule]) -> Vec<&str> {
    rules.iter().map(|rule| rule.message()).collect()
}

#[tokio::test]
async fn test_unknown_field_has_no_failures() {
    let validator = Validator::new();
    let failed = validator.failed_rules_for("missing", "").await.unwrap();
    assert!(failed.is_empty());
}

#[tokio::test]
async fn test_field_without_rules_never_fails() {
    let validator = Validator::new();
    let (field, _rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("name", &field))
        .unwrap();
    for input in ["", " ", "Lester Tester"] {
        assert!(validator.failed_rules_for("name", input).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_register_plain_field_is_rejected() {
    let validator = Validator::new();
    let field = PlainField::new("");
    let err = validator
        .register_field(FieldConfig::plain("name", &field))
        .unwrap_err();
    assert_eq!(err, RegistrationError::NotValidatable("name".into()));
    assert!(validator.field_names().is_empty());
}

#[tokio::test]
async fn test_failed_rules_keep_declaration_order() {
    let validator = Validator::new();
    let (field, _rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("name", &field).rules([
            failing("A", 0),
            failing("B", 50),
            failing("C", 0),
        ]))
        .unwrap();

    for _ in 0..5 {
        let failed = validator.failed_rules_for("name", "x").await.unwrap();
        assert_eq!(messages(&failed), vec!["A", "B", "C"]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_rules_keep_order_when_first_is_slowest() {
    let validator = Validator::new();
    let (field, _rx) = TestField::new("");
    let pass: SharedRule = Arc::new(rule::from_fn("passes", |_| true));
    validator
        .register_field(FieldConfig::validatable("name", &field).rules([
            failing("A", 40),
            pass,
            failing("B", 20),
            failing("C", 0),
        ]))
        .unwrap();

    let failed = validator.failed_rules_for("name", "x").await.unwrap();
    assert_eq!(messages(&failed), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_builtin_rules_through_validator() {
    let validator = Validator::new();
    let (field, _rx) = TestField::new("");
    validator
        .register_field(
            FieldConfig::validatable("name", &field)
                .rule(RequiredRule::new())
                .rule(FullNameRule::new()),
        )
        .unwrap();

    let failed = validator.failed_rules_for("name", "").await.unwrap();
    assert_eq!(messages(&failed), vec![REQUIRED, FULL_NAME]);
    let failed = validator.failed_rules_for("name", "Lester").await.unwrap();
    assert_eq!(messages(&failed), vec![FULL_NAME]);
    assert!(validator.failed_rules_for("name", "Lester Tester").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_first_error_wins_and_abandons_the_rest() {
    let validator = Validator::new();
    let (field, _rx) = TestField::new("");
    let hangs: SharedRule = Arc::new(rule::from_async_fn("never answers", |_| async {
        std::future::pending::<Result<bool, RuleError>>().await
    }));
    let broken: SharedRule = Arc::new(rule::from_async_fn("broken", |_| async {
        Err(RuleError::new("backend down"))
    }));
    validator
        .register_field(FieldConfig::validatable("name", &field).rules([hangs, broken]))
        .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        validator.failed_rules_for("name", "x"),
    )
    .await
    .expect("rule error should abort the fan-in");
    match result {
        Err(ValidationError::Rule { rule, source }) => {
            assert_eq!(rule, "AsyncFnRule");
            assert_eq!(source.message, "backend down");
        }
        other => panic!("expected rule error, got {:?}", other.map(|r| r.len())),
    }
}

#[tokio::test]
async fn test_panicking_rule_is_reported() {
    let validator = Validator::new();
    let (field, _rx) = TestField::new("");
    validator
        .register_field(
            FieldConfig::validatable("name", &field)
                .rule(rule::from_fn("explodes", |_| panic!("rule bug"))),
        )
        .unwrap();
    let result = validator.failed_rules_for("name", "x").await;
    assert!(matches!(result, Err(ValidationError::Panicked)));
}

#[tokio::test]
async fn test_initial_check_failure_is_swallowed() {
    let validator = Validator::new();
    let (field, mut rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("name", &field).rule(rule::from_async_fn(
            "broken",
            |_| async { Err(RuleError::new("backend down")) },
        )))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    flush(validator.context()).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(validator.field_state("name"), Some(FieldState::Unvalidated));
}

#[tokio::test]
async fn test_submit_only_notifies_failing_fields() {
    let validator = Validator::new();
    let (delegate, mut results) = RecordingDelegate::new();
    validator.set_delegate(&delegate);

    let (a, mut a_rx) = TestField::new("");
    let (b, mut b_rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("a", &a).rule(RequiredRule::new()))
        .unwrap();
    validator
        .register_field(FieldConfig::validatable("b", &b).rule(RequiredRule::new()))
        .unwrap();
    next(&mut a_rx).await;
    next(&mut b_rx).await;

    let values: FormSnapshot = [("a", "Lester"), ("b", "")].into_iter().collect();
    assert!(!validator.validate_form(&values).await.unwrap());
    assert!(!next(&mut results).await);

    assert!(drain(&mut a_rx).is_empty());
    assert_eq!(drain(&mut b_rx), vec![FieldEvent::Submit(false, msgs(&[REQUIRED]))]);
    assert_eq!(validator.field_state("a"), Some(FieldState::Valid));
    assert_eq!(validator.field_state("b"), Some(FieldState::Invalid));
}

#[tokio::test]
async fn test_aggregate_all_valid() {
    let validator = Validator::new();
    let (delegate, mut results) = RecordingDelegate::new();
    validator.set_delegate(&delegate);

    let (a, mut a_rx) = TestField::new("");
    let (b, mut b_rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("a", &a).rule(RequiredRule::new()))
        .unwrap();
    validator
        .register_field(FieldConfig::validatable("b", &b).rule(FullNameRule::new()))
        .unwrap();
    next(&mut a_rx).await;
    next(&mut b_rx).await;

    let values: FormSnapshot = [("a", "x"), ("b", "Lester Tester")].into_iter().collect();
    assert!(validator.validate_form(&values).await.unwrap());
    assert!(next(&mut results).await);
    flush(validator.context()).await;
    assert!(drain(&mut results).is_empty());
    assert!(drain(&mut a_rx).is_empty());
    assert!(drain(&mut b_rx).is_empty());
}

#[tokio::test]
async fn test_missing_snapshot_values_validate_as_empty() {
    let validator = Validator::new();
    let (field, mut rx) = TestField::new("Lester");
    validator
        .register_field(FieldConfig::validatable("name", &field).rule(RequiredRule::new()))
        .unwrap();
    next(&mut rx).await;

    assert!(!validator.validate_form(&FormSnapshot::new()).await.unwrap());
    assert_eq!(next(&mut rx).await, FieldEvent::Submit(false, msgs(&[REQUIRED])));
}

#[tokio::test]
async fn test_rule_error_suppresses_form_delivery() {
    let validator = Validator::new();
    let (delegate, mut results) = RecordingDelegate::new();
    validator.set_delegate(&delegate);
    let (good, mut good_rx) = TestField::new("");
    let (bad, _bad_rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("good", &good).rule(RequiredRule::new()))
        .unwrap();
    validator
        .register_field(FieldConfig::validatable("bad", &bad).rule(rule::from_async_fn(
            "broken",
            |input| async move {
                if input.is_empty() {
                    Ok(true)
                } else {
                    Err(RuleError::new("backend down"))
                }
            },
        )))
        .unwrap();
    next(&mut good_rx).await;

    let values: FormSnapshot = [("good", ""), ("bad", "x")].into_iter().collect();
    assert!(matches!(
        validator.validate_form(&values).await,
        Err(ValidationError::Rule { .. })
    ));
    flush(validator.context()).await;
    assert!(drain(&mut results).is_empty());
    assert!(drain(&mut good_rx).is_empty());
    assert_eq!(validator.field_state("good"), Some(FieldState::Invalid));
}

#[tokio::test]
async fn test_cancel_after_fan_in_suppresses_delivery() {
    let (context, mut queue) = NotifyContext::manual();
    let validator = Validator::with_context(context, ValidatorConfig::default());
    let (delegate, mut results) = RecordingDelegate::new();
    validator.set_delegate(&delegate);
    let (field, mut rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("name", &field).rule(RequiredRule::new()))
        .unwrap();

    let handle = validator.spawn_validate_form(FormSnapshot::new());
    let mut waited = 0;
    while !handle.is_finished() && waited < 100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += 1;
    }
    // Fan-in is done and delivery is queued; cancelling now still wins.
    handle.cancel();
    queue.run_pending();
    assert_eq!(handle.wait().await, None);

    assert!(drain(&mut results).is_empty());
    let events = drain(&mut rx);
    assert!(!events.iter().any(|e| matches!(e, FieldEvent::Submit(..))));
}

#[tokio::test]
async fn test_wait_resolves_after_delivery() {
    let (context, mut queue) = NotifyContext::manual();
    let validator = Validator::with_context(context, ValidatorConfig::default());
    let (delegate, mut results) = RecordingDelegate::new();
    validator.set_delegate(&delegate);
    let (field, mut rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("name", &field).rule(RequiredRule::new()))
        .unwrap();

    let handle = validator.spawn_validate_form(FormSnapshot::new());
    let mut waited = 0;
    while !handle.is_finished() && waited < 100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += 1;
    }
    queue.run_pending();
    assert_eq!(handle.wait().await, Some(false));
    assert_eq!(drain(&mut results), vec![false]);
    assert!(
        drain(&mut rx)
            .iter()
            .any(|e| matches!(e, FieldEvent::Submit(false, _)))
    );
}

#[tokio::test]
async fn test_fields_registered_after_spawn_are_not_validated() {
    let validator = Validator::new();
    let (delegate, mut results) = RecordingDelegate::new();
    validator.set_delegate(&delegate);
    let (name, mut name_rx) = TestField::new("Lester");
    validator
        .register_field(FieldConfig::validatable("name", &name).rule(RequiredRule::new()))
        .unwrap();
    next(&mut name_rx).await;

    let values: FormSnapshot = [("name", "Lester")].into_iter().collect();
    let handle = validator.spawn_validate_form(values);
    let (late, mut late_rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("late", &late).rule(RequiredRule::new()))
        .unwrap();

    assert_eq!(handle.wait().await, Some(true));
    assert!(next(&mut results).await);
    flush(validator.context()).await;
    assert!(
        !drain(&mut late_rx)
            .iter()
            .any(|e| matches!(e, FieldEvent::Submit(..)))
    );
}

#[tokio::test]
async fn test_concurrency_limit_bounds_running_rules() {
    let validator = Validator::with_config(ValidatorConfig::new().max_concurrent_rules(1));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let (field, _rx) = TestField::new("");
    let mut config = FieldConfig::validatable("name", &field);
    for _ in 0..4 {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        config = config.rule(rule::from_async_fn("tracked", move |_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(true)
            }
        }));
    }
    validator.register_field(config).unwrap();

    assert!(validator.failed_rules_for("name", "x").await.unwrap().is_empty());
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_values_reads_current_text() {
    let validator = Validator::new();
    let (field, _rx) = TestField::new("Lester");
    validator
        .register_field(FieldConfig::validatable("name", &field))
        .unwrap();
    assert_eq!(validator.values().get("name"), Some("Lester"));
    assert_eq!(validator.values(), validator.values());
}

#[tokio::test]
async fn test_dropping_validator_cancels_background_validation() {
    let validator = Validator::new();
    let (field, _rx) = TestField::new("");
    validator
        .register_field(FieldConfig::validatable("name", &field).rule(rule::from_async_fn(
            "slow",
            |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(true)
            },
        )))
        .unwrap();

    let handle = validator.spawn_validate_form(FormSnapshot::new());
    tokio::task::yield_now().await;
    drop(validator);
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("validation should stop once the validator is gone");
    assert_eq!(outcome, None);
}
