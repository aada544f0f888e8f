//! # Computed-value evaluation
//!
//! Resolves a [`ValueDescriptor`] against a [`ContextBundle`]. Literals are
//! returned unchanged. Computed descriptors are parsed and interpreted in a
//! scope that binds exactly the contexts the descriptor declares; no other
//! identifier is visible.
//!
//! Failures never propagate: [`evaluate`] returns the descriptor's `fallback`
//! and carries the error in [`Evaluation::error`] for diagnostics.
//!
//! ```rust,ignore
//! use metaform_evaluator::{evaluate, ContextBundle};
//! use metaform_template::{ComputedDescriptor, ContextName};
//!
//! let descriptor = ComputedDescriptor::new("userInput.a ?? 'none'")
//!     .with_contexts([ContextName::UserInput]);
//! let result = evaluate(&descriptor.into(), &ContextBundle::new());
//! ```

use crate::context::ContextBundle;
use crate::error::{EvalError, EvalResult};
use crate::interpreter::Interpreter;
use crate::scope::Scope;
use crate::value::Value;
use metaform_parser::{parse_expression, Span};
use metaform_template::{ComputedDescriptor, ContextName, ValueDescriptor};
use serde_json::Value as Json;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outcome of evaluating a descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Json,
    /// Present when `value` is the fallback
    pub error: Option<EvalError>,
}

impl Evaluation {
    pub fn ok(value: Json) -> Self {
        Self { value, error: None }
    }

    pub fn fallback(value: Json, error: EvalError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

pub fn evaluate(descriptor: &ValueDescriptor, bundle: &ContextBundle) -> Evaluation {
    match descriptor {
        ValueDescriptor::Literal(value) => Evaluation::ok(value.clone()),
        ValueDescriptor::Computed(computed) => evaluate_computed(computed, bundle),
    }
}

pub fn evaluate_computed(computed: &ComputedDescriptor, bundle: &ContextBundle) -> Evaluation {
    match evaluate_strict(computed, bundle) {
        Ok(value) => {
            debug!(expression = %computed.expression, "Computed value resolved");
            Evaluation::ok(value.to_json())
        }
        Err(err) => {
            warn!(
                expression = %computed.expression,
                error = %err,
                missing_binding = err.is_missing_binding(),
                "Computed value failed; using fallback"
            );
            Evaluation::fallback(computed.fallback.clone(), err)
        }
    }
}

/// Evaluate without fallback, returning the runtime value
pub fn evaluate_strict(computed: &ComputedDescriptor, bundle: &ContextBundle) -> EvalResult<Value> {
    evaluate_source(&computed.expression, &computed.contexts, bundle)
}

/// Parse and run `source` with only `contexts` bound
pub fn evaluate_source(
    source: &str,
    contexts: &[ContextName],
    bundle: &ContextBundle,
) -> EvalResult<Value> {
    let expr = parse_expression(source)?;
    let scope = Scope::root(bindings(contexts, bundle));
    Interpreter::new().evaluate(&expr, &scope)
}

fn bindings(contexts: &[ContextName], bundle: &ContextBundle) -> HashMap<String, Value> {
    contexts
        .iter()
        .filter_map(|context| {
            bundle
                .binding(*context)
                .map(|value| (context.as_str().to_string(), value))
        })
        .collect()
}

/// Run a field transform over a raw answer.
///
/// The raw answer is always bound as `value`. When the expression yields a
/// function it is applied to the raw answer. On failure the raw answer is
/// kept unchanged.
pub fn apply_transform(transform: &ComputedDescriptor, raw: &Json, bundle: &ContextBundle) -> Evaluation {
    let mut contexts = transform.contexts.clone();
    if !contexts.contains(&ContextName::Value) {
        contexts.push(ContextName::Value);
    }
    let bundle = bundle.clone().with_value(raw.clone());

    let result = evaluate_source(&transform.expression, &contexts, &bundle).and_then(|value| match value {
        Value::Function(_) => Interpreter::new().call_function(
            &value,
            vec![Value::from_json(raw)],
            Span::new(0, transform.expression.len()),
        ),
        other => Ok(other),
    });

    match result {
        Ok(value) => Evaluation::ok(value.to_json()),
        Err(err) => {
            warn!(expression = %transform.expression, error = %err, "Transform failed; keeping raw answer");
            Evaluation::fallback(raw.clone(), err)
        }
    }
}
