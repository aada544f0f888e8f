use criterion::{black_box, criterion_group, criterion_main, Criterion};
use metaform_evaluator::{evaluate, ContextBundle};
use metaform_template::{ComputedDescriptor, ContextName, ValueDescriptor};
use serde_json::json;

fn evaluate_conditional(c: &mut Criterion) {
    let descriptor: ValueDescriptor = ComputedDescriptor::new(
        "userInput.chemical.type === 'acid' ? 'corrosive' : 'none'",
    )
    .with_contexts([ContextName::UserInput])
    .into();
    let bundle = ContextBundle::new().with_user_input(json!({ "chemical": { "type": "acid" } }));

    c.bench_function("evaluate_conditional", |b| {
        b.iter(|| evaluate(black_box(&descriptor), black_box(&bundle)))
    });
}

fn evaluate_projection(c: &mut Criterion) {
    let methods: Vec<_> = (0..50)
        .map(|i| json!({ "name": format!("Method {}", i), "minutes": i }))
        .collect();
    let descriptor: ValueDescriptor = ComputedDescriptor::new(
        "frontmatter.instrument.methods.filter(m => m.minutes > 10).map(m => m.name)",
    )
    .with_contexts([ContextName::Frontmatter])
    .into();
    let bundle = ContextBundle::new().with_frontmatter(json!({ "instrument": { "methods": methods } }));

    c.bench_function("evaluate_projection", |b| {
        b.iter(|| evaluate(black_box(&descriptor), black_box(&bundle)))
    });
}

fn evaluate_fallback(c: &mut Criterion) {
    let descriptor: ValueDescriptor = ComputedDescriptor::new("frontmatter.title")
        .with_contexts([ContextName::UserInput])
        .with_fallback(json!("n/a"))
        .into();
    let bundle = ContextBundle::new();

    c.bench_function("evaluate_fallback", |b| {
        b.iter(|| evaluate(black_box(&descriptor), black_box(&bundle)))
    });
}

criterion_group!(benches, evaluate_conditional, evaluate_projection, evaluate_fallback);
criterion_main!(benches);
