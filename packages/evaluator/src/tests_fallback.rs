//! Descriptor-level recovery: every failure degrades to the fallback value
use crate::*;
use metaform_template::{ComputedDescriptor, ContextName, ValueDescriptor};
use serde_json::json;

fn descriptor(expression: &str, contexts: &[ContextName]) -> ValueDescriptor {
    ComputedDescriptor::new(expression)
        .with_contexts(contexts.iter().copied())
        .with_fallback(json!("n/a"))
        .into()
}

#[test]
fn test_unbound_context_name_returns_fallback() {
    let result = evaluate(&descriptor("frontmatter.title", &[ContextName::UserInput]), &ContextBundle::new());
    assert_eq!(result.value, json!("n/a"));
    assert!(result.error.unwrap().is_missing_binding());
}

#[test]
fn test_declared_but_unsupplied_context_returns_fallback() {
    let result = evaluate(
        &descriptor("selection.name", &[ContextName::Selection]),
        &ContextBundle::new(),
    );
    assert_eq!(result.value, json!("n/a"));
    assert!(matches!(result.error, Some(EvalError::MissingContextBinding { .. })));
}

#[test]
fn test_every_failure_kind_returns_fallback() {
    let sources = [
        "userInput.(",
        "undeclared + 1",
        "userInput.a.b.c",
        "userInput / 0",
        "'x'.nope()",
        "`unterminated ${",
        "1 +",
        "x => { return x }",
    ];
    for source in sources {
        let result = evaluate(&descriptor(source, &[ContextName::UserInput]), &ContextBundle::new());
        assert_eq!(result.value, json!("n/a"), "source: {}", source);
        assert!(result.is_fallback(), "source: {}", source);
    }
}

#[test]
fn test_runaway_inputs_return_fallback() {
    let nested = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
    let sources = [
        nested.as_str(),
        "date.addDays('2024-01-01', 1e15)",
        "'a'.padStart(1e18)",
    ];
    for source in sources {
        let result = evaluate(
            &descriptor(source, &[ContextName::UserInput, ContextName::Date]),
            &ContextBundle::new(),
        );
        assert_eq!(result.value, json!("n/a"), "source: {:.40}", source);
        assert!(result.is_fallback());
    }
}

#[test]
fn test_missing_binding_is_distinguished() {
    let unbound = evaluate(&descriptor("nobody", &[]), &ContextBundle::new());
    assert!(unbound.error.unwrap().is_missing_binding());

    let thrown = evaluate(&descriptor("'a'.nope()", &[]), &ContextBundle::new());
    assert!(!thrown.error.unwrap().is_missing_binding());
}

#[test]
fn test_default_fallback_is_null() {
    let descriptor: ValueDescriptor = ComputedDescriptor::new("nobody").into();
    let result = evaluate(&descriptor, &ContextBundle::new());
    assert_eq!(result.value, serde_json::Value::Null);
}

#[test]
fn test_context_bundle_is_not_mutated() {
    let bundle = ContextBundle::new().with_user_input(json!({ "list": [3, 1, 2] }));
    let result = evaluate(
        &descriptor("userInput.list.sort().reverse()", &[ContextName::UserInput]),
        &bundle,
    );
    assert_eq!(result.value, json!([3, 2, 1]));
    assert_eq!(bundle.user_input(), &json!({ "list": [3, 1, 2] }));
}
