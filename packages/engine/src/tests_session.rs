//! Form session flows: cascades, actions, transforms, variant switches and
//! query selection
use crate::*;
use chrono::NaiveDate;
use metaform_template::{FieldPath, Template};
use serde_json::{json, Value as Json};
use std::sync::Arc;

fn p(path: &str) -> FieldPath {
    FieldPath::parse(path)
}

fn template(value: Json) -> Template {
    Template::from_json(value).unwrap()
}

fn empty_store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryStore::new())
}

fn chemical_store() -> Arc<dyn DocumentStore> {
    Arc::new(
        MemoryStore::new()
            .with_document(
                "chemicals/pva.md",
                &["chemical"],
                json!({ "chemical": { "fieldOfUse": ["binder"], "formula": "(C2H4O)n" } }),
            )
            .with_document(
                "chemicals/hcl.md",
                &["chemical/acid"],
                json!({ "chemical": { "fieldOfUse": ["etching"], "formula": "HCl" } }),
            )
            .with_document(
                "instruments/hplc.md",
                &["instrument"],
                json!({ "instrument": { "methods": [
                    { "name": "Isocratic" },
                    { "name": "Gradient" }
                ] } }),
            ),
    )
}

fn session(value: Json, store: Arc<dyn DocumentStore>) -> FormSession {
    FormSession::new(template(value), json!({ "prefix": "S" }), store)
        .with_today(NaiveDate::from_ymd_opt(2024, 5, 17).unwrap())
}

fn value_updates(updates: &[FieldUpdate]) -> Vec<(String, Json)> {
    updates
        .iter()
        .filter_map(|u| match u {
            FieldUpdate::Value { path, value } => Some((path.to_string(), value.clone())),
            FieldUpdate::Options { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn test_cascade_follows_chains_in_traversal_order() {
    let mut session = session(
        json!({
            "chemical": {
                "type": { "kind": "choice", "options": ["acid", "base"] },
                "safetyNote": {
                    "kind": "text",
                    "default": {
                        "contexts": ["userInput"],
                        "expression": "userInput.chemical.type === 'acid' ? 'corrosive' : 'none'",
                        "reactiveDeps": ["chemical.type"]
                    }
                }
            },
            "banner": {
                "kind": "text",
                "default": {
                    "contexts": ["userInput"],
                    "expression": "userInput.chemical.safetyNote.toUpperCase()",
                    "reactiveDeps": ["chemical.safetyNote"]
                }
            }
        }),
        empty_store(),
    );
    session.start().await.unwrap();
    assert_eq!(session.options(&p("chemical.type")).len(), 2);

    let updates = session.on_answer(&p("chemical.type"), json!("acid")).await.unwrap();
    assert_eq!(
        value_updates(&updates),
        vec![
            ("chemical.type".to_string(), json!("acid")),
            ("chemical.safetyNote".to_string(), json!("corrosive")),
            ("banner".to_string(), json!("CORROSIVE")),
        ]
    );
    assert_eq!(session.diagnostics().count(), 0);
}

#[tokio::test]
async fn test_unchanged_recompute_does_not_propagate() {
    let mut session = session(
        json!({
            "count": { "kind": "number" },
            "parity": {
                "kind": "text",
                "default": {
                    "contexts": ["userInput"],
                    "expression": "userInput.count % 2 === 0 ? 'even' : 'odd'",
                    "reactiveDeps": ["count"]
                }
            },
            "shout": {
                "kind": "text",
                "default": {
                    "contexts": ["userInput"],
                    "expression": "userInput.parity + '!'",
                    "reactiveDeps": ["parity"]
                }
            }
        }),
        empty_store(),
    );
    session.start().await.unwrap();
    session.on_answer(&p("count"), json!(2)).await.unwrap();
    assert_eq!(session.answers().get(&p("shout")), Some(&json!("even!")));

    let updates = session.on_answer(&p("count"), json!(4)).await.unwrap();
    assert_eq!(value_updates(&updates), vec![("count".to_string(), json!(4))]);
}

#[tokio::test]
async fn test_failed_default_records_diagnostic() {
    let mut session = session(
        json!({
            "summary": {
                "kind": "text",
                "default": {
                    "contexts": ["userInput"],
                    "expression": "frontmatter.title",
                    "fallback": "n/a"
                }
            }
        }),
        empty_store(),
    );
    session.start().await.unwrap();

    assert_eq!(session.answers().get(&p("summary")), Some(&json!("n/a")));
    let state = session.field_state(&p("summary")).unwrap();
    let diagnostic = state.diagnostic.unwrap();
    assert!(diagnostic.missing_binding);
    assert!(diagnostic.message.contains("'frontmatter'"));
}

#[tokio::test]
async fn test_transform_and_units_apply_before_storage() {
    let mut session = session(
        json!({
            "title": { "kind": "text", "transform": { "expression": "(value) => value.trim()" } },
            "mass": { "kind": "number", "units": { "allowed": ["g", "mg"], "default": "mg" } }
        }),
        empty_store(),
    );
    session.start().await.unwrap();

    session.on_answer(&p("title"), json!("  Buffer A ")).await.unwrap();
    session.on_answer(&p("mass"), json!(2.5)).await.unwrap();
    assert_eq!(session.answers().get(&p("title")), Some(&json!("Buffer A")));
    assert_eq!(
        session.answers().get(&p("mass")),
        Some(&json!({ "value": 2.5, "unit": "mg" }))
    );

    session.on_answer(&p("mass"), json!("3 g")).await.unwrap();
    assert_eq!(
        session.answers().get(&p("mass")),
        Some(&json!({ "value": 3, "unit": "g" }))
    );
}

#[tokio::test]
async fn test_action_writes_target_and_cascades() {
    let mut session = session(
        json!({
            "counter": {
                "kind": "number",
                "default": 1,
                "action": { "label": "Next", "expression": "value + 1" }
            },
            "sampleId": {
                "kind": "text",
                "action": {
                    "contexts": ["settings", "userInput"],
                    "expression": "settings.prefix + '-' + userInput.counter",
                    "target": "label"
                }
            },
            "label": { "kind": "text" },
            "caption": {
                "kind": "text",
                "default": {
                    "contexts": ["userInput"],
                    "expression": "'Sample ' + userInput.label",
                    "reactiveDeps": ["label"]
                }
            }
        }),
        empty_store(),
    );
    session.start().await.unwrap();

    session.on_action(&p("counter")).await.unwrap();
    assert_eq!(session.answers().get(&p("counter")), Some(&json!(2)));

    let updates = session.on_action(&p("sampleId")).await.unwrap();
    assert_eq!(
        value_updates(&updates),
        vec![
            ("label".to_string(), json!("S-2")),
            ("caption".to_string(), json!("Sample S-2")),
        ]
    );
    assert!(session.answers().get(&p("sampleId")).is_none());

    assert!(matches!(
        session.on_action(&p("label")).await,
        Err(SessionError::NoAction { .. })
    ));
}

#[tokio::test]
async fn test_failed_action_writes_nothing() {
    let mut session = session(
        json!({ "n": { "kind": "number", "default": 3, "action": { "expression": "value / 0" } } }),
        empty_store(),
    );
    session.start().await.unwrap();

    let updates = session.on_action(&p("n")).await.unwrap();
    assert!(updates.is_empty());
    assert_eq!(session.answers().get(&p("n")), Some(&json!(3)));
    assert!(session.field_state(&p("n")).unwrap().diagnostic.is_some());
}

fn variant_template() -> Json {
    json!({
        "mode": {
            "kind": "variant",
            "default": "liquid",
            "variants": {
                "liquid": [
                    { "op": "add", "path": "physical.volume", "field": { "kind": "number", "units": { "allowed": ["ml", "l"] } } }
                ],
                "solid": [
                    { "op": "add", "path": "physical.mass", "field": { "kind": "number" } }
                ]
            }
        },
        "name": { "kind": "text" },
        "physical": {
            "state": {
                "kind": "text",
                "default": {
                    "contexts": ["userInput"],
                    "expression": "userInput.mode === 'solid' ? 'solid' : 'liquid'",
                    "reactiveDeps": ["mode"]
                }
            }
        }
    })
}

#[tokio::test]
async fn test_start_applies_default_variant() {
    let mut session = session(variant_template(), empty_store());
    session.start().await.unwrap();

    assert_eq!(session.answers().get(&p("mode")), Some(&json!("liquid")));
    assert!(session.template().field(&p("physical.volume")).is_some());
    assert_eq!(session.answers().get(&p("physical.state")), Some(&json!("liquid")));
    assert_eq!(session.selectors()[0].selected(), Some("liquid"));
}

#[tokio::test]
async fn test_variant_switch_restores_answers() {
    let mut session = session(variant_template(), empty_store());
    session.start().await.unwrap();
    session.on_answer(&p("name"), json!("Glycerol")).await.unwrap();
    session.on_answer(&p("physical.volume"), json!(5)).await.unwrap();

    session.on_variant_change(&p("mode"), "solid").await.unwrap();

    assert!(session.template().field(&p("physical.volume")).is_none());
    assert!(session.template().field(&p("physical.mass")).is_some());
    assert_eq!(session.answers().get(&p("name")), Some(&json!("Glycerol")));
    assert_eq!(session.answers().get(&p("mode")), Some(&json!("solid")));
    assert_eq!(session.answers().get(&p("physical.state")), Some(&json!("solid")));
    assert!(session.answers().get(&p("physical.volume")).is_none());
}

#[tokio::test]
async fn test_answering_a_selector_switches_variant() {
    let mut session = session(variant_template(), empty_store());
    session.start().await.unwrap();

    session.on_answer(&p("mode"), json!("solid")).await.unwrap();
    assert!(session.template().field(&p("physical.mass")).is_some());

    session.on_answer(&p("mode"), json!("liquid")).await.unwrap();
    assert!(session.template().field(&p("physical.mass")).is_none());
    assert!(session.template().field(&p("physical.volume")).is_some());
}

#[tokio::test]
async fn test_variant_change_errors() {
    let mut session = session(variant_template(), empty_store());
    session.start().await.unwrap();

    assert!(matches!(
        session.on_variant_change(&p("mode"), "gas").await,
        Err(SessionError::UnknownVariant { .. })
    ));
    assert!(matches!(
        session.on_variant_change(&p("name"), "solid").await,
        Err(SessionError::NotAVariantSelector { .. })
    ));
    assert!(matches!(
        session.on_variant_change(&p("nothing"), "solid").await,
        Err(SessionError::UnknownField { .. })
    ));
}

fn query_template(default: Option<&str>) -> Json {
    let mut name = json!({
        "kind": "query",
        "query": {
            "sourceTag": "chemical",
            "returnMap": {
                "chemical.formula": { "contexts": ["frontmatter"], "expression": "frontmatter.chemical.formula" }
            }
        }
    });
    if let Some(default) = default {
        name["default"] = json!(default);
    }
    json!({
        "chemical": {
            "name": name,
            "formula": { "kind": "text" },
            "summary": {
                "kind": "text",
                "default": {
                    "contexts": ["userInput"],
                    "expression": "userInput.chemical.name + ' (' + userInput.chemical.formula + ')'",
                    "reactiveDeps": ["chemical.formula"]
                }
            }
        }
    })
}

#[tokio::test]
async fn test_query_selection_writes_return_map() {
    let mut session = session(query_template(None), chemical_store());
    session.start().await.unwrap();

    let labels: Vec<_> = session
        .options(&p("chemical.name"))
        .iter()
        .map(|o| o.label.clone())
        .collect();
    assert_eq!(labels, vec!["pva", "hcl"]);

    let updates = session.on_answer(&p("chemical.name"), json!("hcl")).await.unwrap();
    assert_eq!(
        value_updates(&updates),
        vec![
            ("chemical.name".to_string(), json!("hcl")),
            ("chemical.formula".to_string(), json!("HCl")),
            ("chemical.summary".to_string(), json!("hcl (HCl)")),
        ]
    );
}

#[tokio::test]
async fn test_query_default_selects_matching_option() {
    let mut session = session(query_template(Some("pva")), chemical_store());
    session.start().await.unwrap();

    assert_eq!(session.answers().get(&p("chemical.name")), Some(&json!("pva")));
    assert_eq!(session.answers().get(&p("chemical.formula")), Some(&json!("(C2H4O)n")));
    assert_eq!(
        session.answers().get(&p("chemical.summary")),
        Some(&json!("pva ((C2H4O)n)"))
    );
}

#[tokio::test]
async fn test_query_default_without_match_is_ignored() {
    let mut session = session(query_template(Some("water")), chemical_store());
    session.start().await.unwrap();
    assert!(session.answers().get(&p("chemical.name")).is_none());
}

#[tokio::test]
async fn test_direct_query_options_follow_their_source() {
    let mut session = session(
        json!({
            "instrument": { "kind": "text" },
            "method": {
                "kind": "query",
                "query": {
                    "from": {
                        "contexts": ["userInput"],
                        "expression": "userInput.instrument",
                        "reactiveDeps": ["instrument"]
                    },
                    "get": {
                        "contexts": ["frontmatter"],
                        "expression": "frontmatter.instrument.methods.map(m => m.name)"
                    }
                }
            }
        }),
        chemical_store(),
    );
    session.start().await.unwrap();
    assert!(session.options(&p("method")).is_empty());

    let updates = session
        .on_answer(&p("instrument"), json!("instruments/hplc.md"))
        .await
        .unwrap();
    assert!(updates
        .iter()
        .any(|u| matches!(u, FieldUpdate::Options { path, options } if path == &p("method") && options.len() == 2)));
    let labels: Vec<_> = session
        .options(&p("method"))
        .iter()
        .map(|o| o.label.as_str())
        .collect();
    assert_eq!(labels, vec!["Isocratic", "Gradient"]);
}

#[tokio::test]
async fn test_submit_returns_answer_tree() {
    let mut session = session(
        json!({
            "sample": {
                "id": { "kind": "text" },
                "created": { "kind": "date", "default": { "contexts": ["date"], "expression": "date.today()" } }
            }
        }),
        empty_store(),
    );
    session.start().await.unwrap();
    session.on_answer(&p("sample.id"), json!("S-1")).await.unwrap();

    assert_eq!(
        session.submit(),
        json!({ "sample": { "created": "2024-05-17", "id": "S-1" } })
    );
}

#[tokio::test]
async fn test_unknown_field_is_rejected() {
    let mut session = session(json!({ "a": { "kind": "text" } }), empty_store());
    session.start().await.unwrap();
    assert!(matches!(
        session.on_answer(&p("b"), json!(1)).await,
        Err(SessionError::UnknownField { .. })
    ));
    session.cancel();
}

#[tokio::test]
async fn test_from_config() {
    let config = Configuration::from_json_str(
        r#"{
            "settings": { "authors": ["Ada", "Grace"] },
            "templates": {
                "note": {
                    "author": { "kind": "choice", "options": { "contexts": ["settings"], "expression": "settings.authors" } }
                }
            }
        }"#,
    )
    .unwrap();
    let mut session = FormSession::from_config(&config, "note", empty_store()).unwrap();
    session.start().await.unwrap();

    let labels: Vec<_> = session
        .options(&p("author"))
        .iter()
        .map(|o| o.label.as_str())
        .collect();
    assert_eq!(labels, vec!["Ada", "Grace"]);
}
