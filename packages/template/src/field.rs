use crate::descriptor::{ActionDescriptor, ComputedDescriptor, ValueDescriptor};
use crate::path::FieldPath;
use crate::query::QuerySpec;
use crate::subclass::SubclassOperation;
use crate::template::Template;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Input kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Date,
    Time,
    /// Single choice from an option list
    Choice,
    /// Multiple choices from an option list
    MultiChoice,
    /// Free list of values
    List,
    /// List of nested objects described by `item`
    ObjectList,
    /// Single document picked from a query
    Query,
    /// Several documents picked from a query
    MultiQuery,
    /// Selects a named subclass of the template
    Variant,
    /// Composite object assembled by the renderer
    Dynamic,
}

impl FieldKind {
    pub const ALL: [FieldKind; 13] = [
        FieldKind::Text,
        FieldKind::Number,
        FieldKind::Boolean,
        FieldKind::Date,
        FieldKind::Time,
        FieldKind::Choice,
        FieldKind::MultiChoice,
        FieldKind::List,
        FieldKind::ObjectList,
        FieldKind::Query,
        FieldKind::MultiQuery,
        FieldKind::Variant,
        FieldKind::Dynamic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::Choice => "choice",
            FieldKind::MultiChoice => "multiChoice",
            FieldKind::List => "list",
            FieldKind::ObjectList => "objectList",
            FieldKind::Query => "query",
            FieldKind::MultiQuery => "multiQuery",
            FieldKind::Variant => "variant",
            FieldKind::Dynamic => "dynamic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Kinds whose options come from `options`
    pub fn is_choice(&self) -> bool {
        matches!(self, FieldKind::Choice | FieldKind::MultiChoice)
    }

    /// Kinds whose options come from a document query
    pub fn is_query(&self) -> bool {
        matches!(self, FieldKind::Query | FieldKind::MultiQuery)
    }

    /// Kinds that hold several values
    pub fn is_multi(&self) -> bool {
        matches!(
            self,
            FieldKind::MultiChoice | FieldKind::MultiQuery | FieldKind::List | FieldKind::ObjectList
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit metadata for numeric fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitSpec {
    pub allowed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl UnitSpec {
    /// Declared default, else the first allowed unit
    pub fn default_unit(&self) -> Option<&str> {
        self.default
            .as_deref()
            .or_else(|| self.allowed.first().map(String::as_str))
    }
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// Leaf template node describing one answerable or derived datum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Field {
    pub kind: FieldKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Shown to the user; non-queried fields are derived-only
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub queried: bool,

    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ValueDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<UnitSpec>,

    /// Applied to the raw answer before storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<ComputedDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QuerySpec>,

    /// Named operation sets, for variant selectors
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variants: IndexMap<String, Vec<SubclassOperation>>,

    /// Row schema for object lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Template>,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub editable: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inline: bool,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            label: None,
            queried: true,
            value: None,
            options: None,
            units: None,
            transform: None,
            action: None,
            query: None,
            variants: IndexMap::new(),
            item: None,
            editable: true,
            inline: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<ValueDescriptor>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_options(mut self, options: impl Into<ValueDescriptor>) -> Self {
        self.options = Some(options.into());
        self
    }

    pub fn with_units(mut self, allowed: &[&str], default: Option<&str>) -> Self {
        self.units = Some(UnitSpec {
            allowed: allowed.iter().map(|u| u.to_string()).collect(),
            default: default.map(str::to_string),
        });
        self
    }

    pub fn with_transform(mut self, transform: ComputedDescriptor) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_query(mut self, query: QuerySpec) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_variant(mut self, name: impl Into<String>, ops: Vec<SubclassOperation>) -> Self {
        self.variants.insert(name.into(), ops);
        self
    }

    pub fn silent(mut self) -> Self {
        self.queried = false;
        self
    }

    /// Dependencies declared by the value descriptor
    pub fn reactive_deps(&self) -> &[FieldPath] {
        self.value
            .as_ref()
            .map(ValueDescriptor::reactive_deps)
            .unwrap_or(&[])
    }

    /// Dependencies that invalidate the field's option list
    pub fn option_deps(&self) -> Vec<&FieldPath> {
        let mut deps: Vec<&FieldPath> = self
            .options
            .as_ref()
            .map(ValueDescriptor::reactive_deps)
            .unwrap_or(&[])
            .iter()
            .collect();
        if let Some(query) = &self.query {
            deps.extend(query.reactive_deps());
        }
        deps
    }

    /// Every dependency the field declares
    pub fn all_reactive_deps(&self) -> Vec<&FieldPath> {
        let mut deps: Vec<&FieldPath> = self.reactive_deps().iter().collect();
        deps.extend(self.option_deps());
        deps
    }

    /// Default variant name of a variant selector
    pub fn default_variant(&self) -> Option<&str> {
        match &self.value {
            Some(ValueDescriptor::Literal(serde_json::Value::String(name)))
                if self.variants.contains_key(name) =>
            {
                Some(name.as_str())
            }
            _ => None,
        }
    }
}

impl From<FieldKind> for Field {
    fn from(kind: FieldKind) -> Self {
        Field::new(kind)
    }
}
