//! # Subclass merge
//!
//! Specializes a base template by a set of [`SubclassOperation`]s. The base
//! is never mutated: the merge works on a deep clone and applies operations
//! in the fixed order Remove -> Replace -> Add, each group in array order.
//!
//! The merge is tolerant. Removing or replacing a path that does not exist is
//! a no-op, and an Add that would have to pass through a field is skipped
//! with a warning.

use metaform_template::{
    AnswerSet, FieldPath, PositionHint, SubclassOperation, Template, TemplateNode, ValueDescriptor,
};
use tracing::{debug, warn};

pub fn merge(base: &Template, ops: &[SubclassOperation]) -> Template {
    let mut merged = base.clone();

    for op in ops {
        if let SubclassOperation::Remove { path } = op {
            remove_tolerant(&mut merged, path);
        }
    }

    for op in ops {
        if let SubclassOperation::Replace {
            path,
            new_path,
            field,
        } = op
        {
            remove_tolerant(&mut merged, path);
            add_tolerant(&mut merged, new_path, field.clone(), None);
        }
    }

    for op in ops {
        if let SubclassOperation::Add {
            path,
            position,
            field,
        } = op
        {
            add_tolerant(&mut merged, path, field.clone(), position.as_ref());
        }
    }

    merged
}

fn remove_tolerant(template: &mut Template, path: &FieldPath) {
    if template.remove(path).is_none() {
        debug!(path = %path, "Remove target not found; ignoring");
    }
}

fn add_tolerant(
    template: &mut Template,
    path: &FieldPath,
    node: TemplateNode,
    position: Option<&PositionHint>,
) {
    if let Err(err) = template.insert(path, node, position) {
        warn!(path = %path, error = %err, "Skipping subclass addition");
    }
}

/// Carry answers across a variant switch.
///
/// Every field of `next` that existed at the same path and with the same kind
/// in `previous`, and that has an answer, keeps that answer. Its default is
/// seeded with the answer unless the default is reactive or reads external
/// contexts. Answers for paths that no longer hold a same-kind field are
/// dropped.
pub fn restore_answers(
    previous: &Template,
    next: &Template,
    answers: &AnswerSet,
) -> (Template, AnswerSet) {
    let mut restored = next.clone();
    let mut kept = AnswerSet::new();

    for (path, field) in next.fields() {
        let same_kind = previous
            .field(&path)
            .map(|old| old.kind == field.kind)
            .unwrap_or(false);
        if !same_kind {
            continue;
        }
        let Some(answer) = answers.get(&path) else {
            continue;
        };

        kept.set(&path, answer.clone());

        let seedable = match &field.value {
            None | Some(ValueDescriptor::Literal(_)) => true,
            Some(ValueDescriptor::Computed(computed)) => {
                !computed.is_reactive() && computed.contexts.is_empty()
            }
        };
        if seedable {
            if let Some(target) = restored.field_mut(&path) {
                target.value = Some(ValueDescriptor::Literal(answer.clone()));
            }
        }
    }

    (restored, kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaform_template::{ContextName, Field, FieldKind};
    use serde_json::json;

    fn base() -> Template {
        Template::from_json(json!({
            "chemical": {
                "type": { "kind": "choice", "options": ["acid", "base"] },
                "safetyNote": {
                    "kind": "text",
                    "default": {
                        "contexts": ["userInput"],
                        "expression": "userInput.chemical.type==='acid' ? 'corrosive' : 'none'",
                        "reactiveDeps": ["chemical.type"]
                    }
                }
            }
        }))
        .unwrap()
    }

    fn names(template: &Template) -> Vec<String> {
        template.fields().into_iter().map(|(p, _)| p.to_string()).collect()
    }

    #[test]
    fn test_merge_never_mutates_base() {
        let base = base();
        let snapshot = base.clone();
        let _ = merge(
            &base,
            &[
                SubclassOperation::remove("chemical.type"),
                SubclassOperation::add("chemical.pH", Field::new(FieldKind::Number)),
            ],
        );
        assert_eq!(base, snapshot);
    }

    #[test]
    fn test_add_then_remove() {
        let merged = merge(
            &base(),
            &[
                SubclassOperation::add("chemical.pH", Field::new(FieldKind::Number)),
                SubclassOperation::remove("chemical.type"),
            ],
        );
        assert!(merged.get(&FieldPath::parse("chemical.type")).is_none());
        assert!(merged.field(&FieldPath::parse("chemical.pH")).is_some());
    }

    #[test]
    fn test_add_remove_inverse() {
        let base = base();
        let added = merge(&base, &[SubclassOperation::add("chemical.pH", FieldKind::Number)]);
        let removed = merge(&added, &[SubclassOperation::remove("chemical.pH")]);
        assert_eq!(removed, base);
    }

    #[test]
    fn test_add_remove_inverse_drops_created_groups() {
        let base = base();
        let added = merge(&base, &[SubclassOperation::add("storage.cabinet.shelf", FieldKind::Text)]);
        assert!(added.get(&FieldPath::parse("storage.cabinet")).is_some());
        let removed = merge(&added, &[SubclassOperation::remove("storage.cabinet.shelf")]);
        assert!(removed.get(&FieldPath::parse("storage")).is_none());
        assert_eq!(removed, base);
    }

    #[test]
    fn test_remove_runs_before_add_regardless_of_order() {
        // Add first in the array, Remove second: the Add survives because
        // Remove sees the original tree
        let merged = merge(
            &base(),
            &[
                SubclassOperation::add("chemical.type", Field::new(FieldKind::Text)),
                SubclassOperation::remove("chemical.type"),
            ],
        );
        assert_eq!(
            merged.field(&FieldPath::parse("chemical.type")).map(|f| f.kind),
            Some(FieldKind::Text)
        );
        assert_eq!(names(&merged), vec!["chemical.safetyNote", "chemical.type"]);
    }

    #[test]
    fn test_replace_appends_at_new_path() {
        let merged = merge(
            &base(),
            &[SubclassOperation::replace(
                "chemical.type",
                "chemical.category",
                Field::new(FieldKind::Text),
            )],
        );
        assert_eq!(names(&merged), vec!["chemical.safetyNote", "chemical.category"]);
    }

    #[test]
    fn test_replace_sees_original_tree_before_add() {
        let merged = merge(
            &base(),
            &[
                SubclassOperation::add_at(
                    "chemical.hazard",
                    PositionHint::After("category".to_string()),
                    FieldKind::Text,
                ),
                SubclassOperation::replace("chemical.type", "chemical.category", FieldKind::Text),
            ],
        );
        assert_eq!(
            names(&merged),
            vec!["chemical.safetyNote", "chemical.category", "chemical.hazard"]
        );
    }

    #[test]
    fn test_adds_apply_in_array_order() {
        let merged = merge(
            &base(),
            &[
                SubclassOperation::add("storage.room", FieldKind::Text),
                SubclassOperation::add_at(
                    "storage.shelf",
                    PositionHint::Before("room".to_string()),
                    FieldKind::Text,
                ),
            ],
        );
        assert_eq!(
            names(&merged),
            vec!["chemical.type", "chemical.safetyNote", "storage.shelf", "storage.room"]
        );
    }

    #[test]
    fn test_missing_paths_are_tolerated() {
        let base = base();
        let merged = merge(
            &base,
            &[
                SubclassOperation::remove("chemical.missing"),
                SubclassOperation::remove("nowhere.at.all"),
                SubclassOperation::add("chemical.type.sub", FieldKind::Text),
            ],
        );
        assert_eq!(merged, base);
    }

    #[test]
    fn test_restore_keeps_same_kind_answers() {
        let previous = base();
        let next = merge(
            &previous,
            &[SubclassOperation::replace("chemical.type", "chemical.type", FieldKind::Text)],
        );
        let answers = AnswerSet::from_value(json!({
            "chemical": { "type": "acid", "safetyNote": "corrosive" }
        }));

        let (restored, kept) = restore_answers(&previous, &next, &answers);

        // `type` changed kind, so its answer is dropped
        assert!(kept.get(&FieldPath::parse("chemical.type")).is_none());
        assert_eq!(
            kept.get(&FieldPath::parse("chemical.safetyNote")),
            Some(&json!("corrosive"))
        );
        // reactive defaults are left in place
        let note = restored.field(&FieldPath::parse("chemical.safetyNote")).unwrap();
        assert!(note.value.as_ref().unwrap().computed().is_some());
    }

    #[test]
    fn test_restore_seeds_literal_defaults() {
        let previous = Template::from_json(json!({
            "name": { "kind": "text", "default": "unnamed" },
            "when": {
                "kind": "date",
                "default": { "contexts": ["date"], "expression": "date.today()" }
            }
        }))
        .unwrap();
        let answers = AnswerSet::from_value(json!({ "name": "HCl", "when": "2024-01-01" }));

        let (restored, _) = restore_answers(&previous, &previous, &answers);

        assert_eq!(
            restored.field(&FieldPath::parse("name")).unwrap().value,
            Some(ValueDescriptor::literal("HCl"))
        );
        let when = restored.field(&FieldPath::parse("when")).unwrap();
        assert_eq!(
            when.value.as_ref().and_then(|v| v.computed()).map(|c| c.contexts.clone()),
            Some(vec![ContextName::Date])
        );
    }
}
