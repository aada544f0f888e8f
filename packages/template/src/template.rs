use crate::error::{TemplateError, TemplateResult, TemplateWarning};
use crate::field::{Field, FieldKind};
use crate::path::FieldPath;
use crate::query::QueryMode;
use crate::subclass::PositionHint;
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Template node: a nested group or a field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TemplateNode {
    Group(Group),
    Field(Field),
}

/// Order-preserving mapping of names to child nodes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Group {
    children: IndexMap<String, TemplateNode>,
}

/// Tree-shaped form schema
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Template {
    root: Group,
}

impl TemplateNode {
    pub fn as_field(&self) -> Option<&Field> {
        match self {
            TemplateNode::Field(field) => Some(field),
            TemplateNode::Group(_) => None,
        }
    }

    pub fn as_field_mut(&mut self) -> Option<&mut Field> {
        match self {
            TemplateNode::Field(field) => Some(field),
            TemplateNode::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            TemplateNode::Group(group) => Some(group),
            TemplateNode::Field(_) => None,
        }
    }

    /// Build a node from configuration JSON.
    ///
    /// An object whose `kind` is a string is a field; any other object is a
    /// group of named children.
    pub fn from_json(value: Value, path: &FieldPath) -> TemplateResult<Self> {
        let map = match value {
            Value::Object(map) => map,
            _ => return Err(TemplateError::InvalidNode { path: path.clone() }),
        };

        if let Some(Value::String(kind)) = map.get("kind") {
            if FieldKind::from_name(kind).is_none() {
                return Err(TemplateError::UnsupportedFieldKind {
                    path: path.clone(),
                    kind: kind.clone(),
                });
            }
            let field: Field =
                serde_json::from_value(Value::Object(map)).map_err(|err| TemplateError::InvalidField {
                    path: path.clone(),
                    message: err.to_string(),
                })?;
            return Ok(TemplateNode::Field(field));
        }

        let mut group = Group::new();
        for (name, child) in map {
            let child_path = path.child(name.clone());
            group.insert(name, TemplateNode::from_json(child, &child_path)?);
        }
        Ok(TemplateNode::Group(group))
    }
}

impl From<Field> for TemplateNode {
    fn from(field: Field) -> Self {
        TemplateNode::Field(field)
    }
}

impl From<FieldKind> for TemplateNode {
    fn from(kind: FieldKind) -> Self {
        TemplateNode::Field(Field::new(kind))
    }
}

impl From<Group> for TemplateNode {
    fn from(group: Group) -> Self {
        TemplateNode::Group(group)
    }
}

impl<'de> Deserialize<'de> for TemplateNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        TemplateNode::from_json(raw, &FieldPath::root()).map_err(D::Error::custom)
    }
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style child insertion
    pub fn with(mut self, name: impl Into<String>, node: impl Into<TemplateNode>) -> Self {
        self.insert(name, node.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&TemplateNode> {
        self.children.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TemplateNode> {
        self.children.get_mut(name)
    }

    /// Insert or replace a child; a replaced child keeps its position
    pub fn insert(&mut self, name: impl Into<String>, node: TemplateNode) {
        self.children.insert(name.into(), node);
    }

    /// Insert next to a sibling; appends when the sibling is absent
    pub fn insert_relative(&mut self, name: impl Into<String>, node: TemplateNode, hint: &PositionHint) {
        let name = name.into();
        self.children.shift_remove(&name);

        let index = match hint {
            PositionHint::Before(sibling) => self.children.get_index_of(sibling.as_str()),
            PositionHint::After(sibling) => self
                .children
                .get_index_of(sibling.as_str())
                .map(|idx| idx + 1),
        };

        match index {
            Some(index) => {
                self.children.shift_insert(index, name, node);
            }
            None => {
                self.children.insert(name, node);
            }
        }
    }

    /// Remove a child, preserving the order of the remaining children
    pub fn remove(&mut self, name: &str) -> Option<TemplateNode> {
        self.children.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TemplateNode)> {
        self.children.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.children.keys()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Template {
    pub fn new(root: Group) -> Self {
        Self { root }
    }

    pub fn from_json(value: Value) -> TemplateResult<Self> {
        match TemplateNode::from_json(value, &FieldPath::root())? {
            TemplateNode::Group(root) => Ok(Self { root }),
            TemplateNode::Field(_) => Err(TemplateError::InvalidNode {
                path: FieldPath::root(),
            }),
        }
    }

    pub fn from_json_str(source: &str) -> TemplateResult<Self> {
        let value: Value = serde_json::from_str(source)?;
        Self::from_json(value)
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn get(&self, path: &FieldPath) -> Option<&TemplateNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.get(first)?;
        for segment in rest {
            node = node.as_group()?.get(segment)?;
        }
        Some(node)
    }

    pub fn get_mut(&mut self, path: &FieldPath) -> Option<&mut TemplateNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.get_mut(first)?;
        for segment in rest {
            node = match node {
                TemplateNode::Group(group) => group.get_mut(segment)?,
                TemplateNode::Field(_) => return None,
            };
        }
        Some(node)
    }

    pub fn field(&self, path: &FieldPath) -> Option<&Field> {
        self.get(path).and_then(TemplateNode::as_field)
    }

    pub fn field_mut(&mut self, path: &FieldPath) -> Option<&mut Field> {
        self.get_mut(path).and_then(TemplateNode::as_field_mut)
    }

    /// Group at `path`; the empty path is the root
    fn group_mut(&mut self, path: &FieldPath) -> Option<&mut Group> {
        let mut group = &mut self.root;
        for segment in path.segments() {
            group = match group.get_mut(segment)? {
                TemplateNode::Group(child) => child,
                TemplateNode::Field(_) => return None,
            };
        }
        Some(group)
    }

    /// Every field with its path, depth-first in insertion order
    pub fn fields(&self) -> Vec<(FieldPath, &Field)> {
        let mut fields = Vec::new();
        collect_fields(&self.root, &FieldPath::root(), &mut fields);
        fields
    }

    /// Remove the node at `path`; a missing path is a no-op returning `None`.
    ///
    /// Groups left empty by the removal are removed as well, up to the root.
    pub fn remove(&mut self, path: &FieldPath) -> Option<TemplateNode> {
        let name = path.last()?.to_string();
        let parent = path.parent()?;
        let removed = self.group_mut(&parent)?.remove(&name)?;
        self.prune_empty_groups(parent);
        Some(removed)
    }

    fn prune_empty_groups(&mut self, mut path: FieldPath) {
        while let Some(parent) = path.parent() {
            let Some(name) = path.last().map(str::to_string) else {
                break;
            };
            let empty = self.group_mut(&path).map(|g| g.is_empty()).unwrap_or(false);
            if !empty {
                break;
            }
            if let Some(group) = self.group_mut(&parent) {
                group.remove(&name);
            }
            path = parent;
        }
    }

    /// Insert a node, creating intermediate groups as needed
    pub fn insert(
        &mut self,
        path: &FieldPath,
        node: TemplateNode,
        position: Option<&PositionHint>,
    ) -> TemplateResult<()> {
        let (name, parents) = path
            .segments()
            .split_last()
            .ok_or(TemplateError::EmptyPath)?;

        let mut group = &mut self.root;
        let mut walked = FieldPath::root();
        for segment in parents {
            walked = walked.child(segment.clone());
            let child = group
                .children
                .entry(segment.clone())
                .or_insert_with(|| TemplateNode::Group(Group::new()));
            group = match child {
                TemplateNode::Group(child) => child,
                TemplateNode::Field(_) => {
                    return Err(TemplateError::NotAGroup {
                        path: path.clone(),
                        blocking: walked,
                    })
                }
            };
        }

        match position {
            Some(hint) => group.insert_relative(name.clone(), node, hint),
            None => group.insert(name.clone(), node),
        }
        Ok(())
    }

    /// Report non-fatal inconsistencies in the schema
    pub fn validate(&self) -> Vec<TemplateWarning> {
        let mut warnings = Vec::new();

        for (path, field) in self.fields() {
            for dep in field.all_reactive_deps() {
                if !self.resolves(dep) {
                    warnings.push(TemplateWarning {
                        path: path.clone(),
                        message: format!("reactive dependency '{}' does not name a field", dep),
                    });
                }
            }

            if field.kind.is_choice() && field.options.is_none() {
                warnings.push(TemplateWarning {
                    path: path.clone(),
                    message: format!("{} field has no options", field.kind),
                });
            }

            if field.kind.is_query() && field.query.is_none() {
                warnings.push(TemplateWarning {
                    path: path.clone(),
                    message: format!("{} field has no query", field.kind),
                });
            }

            if let Some(query) = &field.query {
                if let QueryMode::Search { source_tag, .. } = &query.mode {
                    if source_tag.trim().is_empty() {
                        warnings.push(TemplateWarning {
                            path: path.clone(),
                            message: "query has an empty source tag".to_string(),
                        });
                    }
                }
            }

            if field.kind == FieldKind::Variant && field.variants.is_empty() {
                warnings.push(TemplateWarning {
                    path: path.clone(),
                    message: "variant selector declares no variants".to_string(),
                });
            }

            if let Some(units) = &field.units {
                if field.kind != FieldKind::Number {
                    warnings.push(TemplateWarning {
                        path: path.clone(),
                        message: "units are only meaningful on number fields".to_string(),
                    });
                }
                if let Some(default) = &units.default {
                    if !units.allowed.contains(default) {
                        warnings.push(TemplateWarning {
                            path: path.clone(),
                            message: format!("default unit '{}' is not in the allowed units", default),
                        });
                    }
                }
            }
        }

        warnings
    }

    /// A dependency resolves to a node, or into the value of a field
    fn resolves(&self, dep: &FieldPath) -> bool {
        if self.get(dep).is_some() {
            return true;
        }
        let mut prefix = dep.parent();
        while let Some(path) = prefix {
            if path.is_empty() {
                break;
            }
            if self.field(&path).is_some() {
                return true;
            }
            prefix = path.parent();
        }
        false
    }
}

fn collect_fields<'a>(group: &'a Group, base: &FieldPath, out: &mut Vec<(FieldPath, &'a Field)>) {
    for (name, node) in group.iter() {
        let path = base.child(name.clone());
        match node {
            TemplateNode::Field(field) => out.push((path, field)),
            TemplateNode::Group(child) => collect_fields(child, &path, out),
        }
    }
}

impl<'de> Deserialize<'de> for Template {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Template::from_json(raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ComputedDescriptor, ContextName};
    use serde_json::json;

    fn chemical_template() -> Template {
        Template::from_json(json!({
            "chemical": {
                "name": { "kind": "text" },
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
            "date": { "kind": "date" }
        }))
        .unwrap()
    }

    fn names(template: &Template) -> Vec<String> {
        template.fields().into_iter().map(|(p, _)| p.to_string()).collect()
    }

    #[test]
    fn test_fields_in_insertion_order() {
        let template = chemical_template();
        assert_eq!(
            names(&template),
            vec!["chemical.name", "chemical.type", "chemical.safetyNote", "date"]
        );
    }

    #[test]
    fn test_lookup_by_path() {
        let template = chemical_template();
        let note = template.field(&FieldPath::parse("chemical.safetyNote")).unwrap();
        let computed = note.value.as_ref().unwrap().computed().unwrap();
        assert!(computed.declares(ContextName::UserInput));
        assert!(template.field(&FieldPath::parse("chemical")).is_none());
        assert!(template.get(&FieldPath::parse("chemical")).is_some());
        assert!(template.get(&FieldPath::parse("chemical.name.first")).is_none());
    }

    #[test]
    fn test_unsupported_kind_is_fatal() {
        let err = Template::from_json(json!({ "a": { "b": { "kind": "colorPicker" } } })).unwrap_err();
        match err {
            TemplateError::UnsupportedFieldKind { path, kind } => {
                assert_eq!(path, FieldPath::parse("a.b"));
                assert_eq!(kind, "colorPicker");
            }
            other => panic!("Expected UnsupportedFieldKind, got {:?}", other),
        }
    }

    #[test]
    fn test_non_object_node_is_invalid() {
        let err = Template::from_json(json!({ "a": 3 })).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidNode { .. }));
    }

    #[test]
    fn test_group_named_kind_is_still_a_group() {
        let template = Template::from_json(json!({ "kind": { "kind": "text" } })).unwrap();
        assert_eq!(names(&template), vec!["kind"]);
    }

    #[test]
    fn test_insert_creates_intermediate_groups() {
        let mut template = Template::default();
        template
            .insert(&FieldPath::parse("a.b.c"), FieldKind::Text.into(), None)
            .unwrap();
        assert!(template.field(&FieldPath::parse("a.b.c")).is_some());
    }

    #[test]
    fn test_insert_through_field_fails() {
        let mut template = chemical_template();
        let err = template
            .insert(&FieldPath::parse("date.day"), FieldKind::Number.into(), None)
            .unwrap_err();
        assert!(matches!(err, TemplateError::NotAGroup { ref blocking, .. } if blocking == &FieldPath::parse("date")));
    }

    #[test]
    fn test_insert_with_position_hint() {
        let mut template = chemical_template();
        template
            .insert(
                &FieldPath::parse("chemical.pH"),
                FieldKind::Number.into(),
                Some(&PositionHint::After("name".to_string())),
            )
            .unwrap();
        template
            .insert(
                &FieldPath::parse("chemical.cas"),
                FieldKind::Text.into(),
                Some(&PositionHint::Before("name".to_string())),
            )
            .unwrap();
        assert_eq!(
            names(&template),
            vec![
                "chemical.cas",
                "chemical.name",
                "chemical.pH",
                "chemical.type",
                "chemical.safetyNote",
                "date"
            ]
        );
    }

    #[test]
    fn test_remove_preserves_sibling_order() {
        let mut template = chemical_template();
        assert!(template.remove(&FieldPath::parse("chemical.type")).is_some());
        assert!(template.remove(&FieldPath::parse("chemical.missing")).is_none());
        assert!(template.remove(&FieldPath::parse("nothing.here")).is_none());
        assert_eq!(names(&template), vec!["chemical.name", "chemical.safetyNote", "date"]);
    }

    #[test]
    fn test_remove_prunes_emptied_groups() {
        let mut template = chemical_template();
        template
            .insert(&FieldPath::parse("storage.cabinet.shelf"), Field::new(FieldKind::Text).into(), None)
            .unwrap();
        template
            .insert(&FieldPath::parse("storage.room"), Field::new(FieldKind::Text).into(), None)
            .unwrap();

        template.remove(&FieldPath::parse("storage.cabinet.shelf")).unwrap();
        assert!(template.get(&FieldPath::parse("storage.cabinet")).is_none());
        assert!(template.get(&FieldPath::parse("storage")).is_some());

        template.remove(&FieldPath::parse("storage.room")).unwrap();
        assert!(template.get(&FieldPath::parse("storage")).is_none());
        assert_eq!(template, chemical_template());
    }

    #[test]
    fn test_validate_reports_unknown_dependency() {
        let mut template = chemical_template();
        template
            .insert(
                &FieldPath::parse("summary"),
                Field::new(FieldKind::Text)
                    .with_value(
                        ComputedDescriptor::new("userInput.project.name")
                            .with_reactive_deps(["project.name", "chemical.name.first"]),
                    )
                    .into(),
                None,
            )
            .unwrap();

        let warnings = template.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("project.name"));
    }

    #[test]
    fn test_serialize_round_trip_preserves_order() {
        let template = chemical_template();
        let json = serde_json::to_value(&template).unwrap();
        let keys: Vec<_> = json["chemical"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "type", "safetyNote"]);
        assert_eq!(Template::from_json(json).unwrap(), template);
    }
}
