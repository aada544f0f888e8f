//! Expression semantics: operators, chains, built-in methods, arrow functions
use crate::*;
use chrono::NaiveDate;
use metaform_template::ContextName;
use serde_json::{json, Value as Json};

fn bundle() -> ContextBundle {
    ContextBundle::new()
        .with_user_input(json!({
            "chemical": { "type": "acid", "name": "  Hydrochloric acid ", "mass": 12.5 },
            "tags": ["binder", "solvent"],
            "count": 3
        }))
        .with_settings(json!({ "authors": ["Ada", "Grace"], "lab": { "name": "North" } }))
        .with_frontmatter(json!({
            "instrument": {
                "methods": [
                    { "name": "Isocratic", "minutes": 12 },
                    { "name": "Gradient", "minutes": 30 }
                ]
            }
        }))
        .with_today(NaiveDate::from_ymd_opt(2024, 5, 17).unwrap())
}

fn eval(source: &str) -> Json {
    evaluate_source(source, &ContextName::ALL, &bundle())
        .unwrap_or_else(|err| panic!("'{}' failed: {}", source, err))
        .to_json()
}

fn eval_err(source: &str) -> EvalError {
    match evaluate_source(source, &ContextName::ALL, &bundle()) {
        Ok(value) => panic!("'{}' unexpectedly produced {:?}", source, value),
        Err(err) => err,
    }
}

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(eval("1 + 2 * 3"), json!(7));
    assert_eq!(eval("(1 + 2) * 3"), json!(9));
    assert_eq!(eval("10 % 4 - -1"), json!(3));
    assert_eq!(eval("userInput.count / 2"), json!(1.5));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("'n=' + userInput.count"), json!("n=3"));
    assert_eq!(eval("`${settings.lab.name}-${userInput.count + 1}`"), json!("North-4"));
}

#[test]
fn test_comparisons() {
    assert_eq!(eval("userInput.count >= 3"), json!(true));
    assert_eq!(eval("'2024-01-01' < '2024-02-01'"), json!(true));
    assert!(matches!(eval_err("userInput.count < 'x'"), EvalError::InvalidOperands { .. }));
}

#[test]
fn test_deep_equality() {
    assert_eq!(eval("userInput.tags === ['binder', 'solvent']"), json!(true));
    assert_eq!(eval("{ a: 1, b: [2] } == { b: [2], a: 1 }"), json!(true));
    assert_eq!(eval("userInput.chemical.type !== 'acid'"), json!(false));
}

#[test]
fn test_logical_operators_return_operands() {
    assert_eq!(eval("userInput.missing || 'default'"), json!("default"));
    assert_eq!(eval("userInput.count && 'yes'"), json!("yes"));
    assert_eq!(eval("'' ?? 'unused'"), json!(""));
    assert_eq!(eval("null ?? 'used'"), json!("used"));
    assert_eq!(eval("!userInput.tags"), json!(false));
}

#[test]
fn test_short_circuit_skips_unbound_names() {
    assert_eq!(eval("false && nothing.here"), json!(false));
    assert_eq!(eval("true || nothing.here"), json!(true));
}

#[test]
fn test_optional_chaining() {
    assert_eq!(eval("userInput.project?.name"), Json::Null);
    assert_eq!(eval("userInput.project?.name.first"), Json::Null);
    assert_eq!(eval("userInput.project?.[0]"), Json::Null);
    assert!(matches!(eval_err("userInput.project.name"), EvalError::TypeError { .. }));
}

#[test]
fn test_index_access() {
    assert_eq!(eval("userInput.tags[1]"), json!("solvent"));
    assert_eq!(eval("userInput.tags[5]"), Json::Null);
    assert_eq!(eval("userInput['chemical']['type']"), json!("acid"));
    assert_eq!(eval("userInput.tags.length"), json!(2));
}

#[test]
fn test_projection_over_frontmatter() {
    assert_eq!(
        eval("frontmatter.instrument.methods.map(m => m.name)"),
        json!(["Isocratic", "Gradient"])
    );
    assert_eq!(
        eval("frontmatter.instrument.methods.filter(m => m.minutes > 20).map(m => m.name)"),
        json!(["Gradient"])
    );
    assert_eq!(
        eval("frontmatter.instrument.methods.reduce((sum, m) => sum + m.minutes, 0)"),
        json!(42)
    );
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("userInput.chemical.name.trim()"), json!("Hydrochloric acid"));
    assert_eq!(eval("userInput.chemical.name.trim().split(' ')"), json!(["Hydrochloric", "acid"]));
    assert_eq!(eval("'abc'.toUpperCase().slice(-2)"), json!("BC"));
    assert_eq!(eval("'7'.padStart(3, '0')"), json!("007"));
    assert_eq!(eval("'a-b-c'.replaceAll('-', '/')"), json!("a/b/c"));
    assert_eq!(eval("'a-b-c'.replace('-', '/')"), json!("a/b-c"));
    assert_eq!(eval("'hello'.substring(3, 1)"), json!("el"));
    assert_eq!(eval("'hello'.indexOf('l')"), json!(2));
}

#[test]
fn test_array_methods() {
    assert_eq!(eval("settings.authors.join(' & ')"), json!("Ada & Grace"));
    assert_eq!(eval("settings.authors.includes('Ada')"), json!(true));
    assert_eq!(eval("settings.authors.find(a => a.startsWith('G'))"), json!("Grace"));
    assert_eq!(eval("settings.authors.findIndex(a => a === 'Zed')"), json!(-1));
    assert_eq!(eval("[3, 1, 2].sort((a, b) => a - b)"), json!([1, 2, 3]));
    assert_eq!(eval("['b', 'a'].sort()"), json!(["a", "b"]));
    assert_eq!(eval("[[1], [2, 3], 4].flat()"), json!([1, 2, 3, 4]));
    assert_eq!(eval("[1, 2, 3].at(-1)"), json!(3));
    assert_eq!(eval("[1, 2].concat([3], 4)"), json!([1, 2, 3, 4]));
    assert_eq!(eval("[1, 2, 3].some(n => n > 2) && [1, 2, 3].every(n => n > 0)"), json!(true));
}

#[test]
fn test_pad_start_width_is_bounded() {
    assert_eq!(eval("'a'.padStart(-3)"), json!("a"));
    assert!(matches!(eval_err("'a'.padStart(1e18)"), EvalError::TypeError { .. }));
    assert!(matches!(eval_err("'a'.padStart(70000, '0')"), EvalError::TypeError { .. }));
}

#[test]
fn test_number_methods() {
    assert_eq!(eval("userInput.chemical.mass.toFixed(2)"), json!("12.50"));
    assert_eq!(eval("(3).toString()"), json!("3"));
}

#[test]
fn test_closures_capture_outer_params() {
    assert_eq!(
        eval("settings.authors.map(a => userInput.tags.map(t => a + ':' + t)).flat().length"),
        json!(4)
    );
}

#[test]
fn test_object_literal_shorthand_and_methods() {
    assert_eq!(eval("{ f: x => x * 2 }.f(21)"), json!(42));
    assert_eq!(eval("{ 'quoted key': 1 }['quoted key']"), json!(1));
}

#[test]
fn test_date_helper() {
    assert_eq!(eval("date.today()"), json!("2024-05-17"));
    assert_eq!(eval("date.addDays(date.today(), 14)"), json!("2024-05-31"));
    assert_eq!(eval("date.format(date.today(), 'DD.MM.YYYY')"), json!("17.05.2024"));
    assert_eq!(eval("date.diffDays('2024-06-01', date.today())"), json!(15));
}

#[test]
fn test_unknown_method_and_not_callable() {
    assert!(matches!(eval_err("userInput.tags.push(1)"), EvalError::UnknownMethod { .. }));
    assert!(matches!(eval_err("userInput.count()"), EvalError::NotCallable { .. }));
    assert!(matches!(eval_err("[].reduce((a, b) => a)"), EvalError::TypeError { .. }));
}

#[test]
fn test_division_by_zero() {
    assert!(matches!(eval_err("userInput.count / 0"), EvalError::DivisionByZero { .. }));
}

#[test]
fn test_no_ambient_globals() {
    for source in ["Math.max(1, 2)", "window", "globalThis.process", "JSON.stringify(1)"] {
        let err = eval_err(source);
        assert!(
            matches!(err, EvalError::UnboundIdentifier { .. }),
            "{} should be unbound, got {:?}",
            source,
            err
        );
    }
}
