//! Declarative document queries attached to query-kind fields

use crate::descriptor::ValueDescriptor;
use crate::path::FieldPath;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Query specification for `query` / `multiQuery` fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    #[serde(flatten)]
    pub mode: QueryMode,

    /// Target path -> extraction descriptor, evaluated once an option is chosen
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub return_map: IndexMap<FieldPath, ValueDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryMode {
    /// Every document carrying `source_tag` whose fields satisfy all predicates
    #[serde(rename_all = "camelCase")]
    Search {
        source_tag: String,
        #[serde(default)]
        predicates: Vec<Predicate>,
    },

    /// One document resolved by `from`; options projected from it by `get`
    Direct {
        from: ValueDescriptor,
        get: ValueDescriptor,
    },
}

/// A single condition on a document metadata field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Dotted path into the document's structured metadata
    pub field: FieldPath,
    #[serde(flatten)]
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Condition {
    Equals(ValueDescriptor),
    NotEquals(ValueDescriptor),
    /// Array membership or substring match
    Contains(ValueDescriptor),
    Exists(bool),
}

impl QuerySpec {
    pub fn search(source_tag: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            mode: QueryMode::Search {
                source_tag: source_tag.into(),
                predicates,
            },
            return_map: IndexMap::new(),
        }
    }

    pub fn direct(from: ValueDescriptor, get: ValueDescriptor) -> Self {
        Self {
            mode: QueryMode::Direct { from, get },
            return_map: IndexMap::new(),
        }
    }

    pub fn with_return(mut self, target: impl Into<FieldPath>, extraction: ValueDescriptor) -> Self {
        self.return_map.insert(target.into(), extraction);
        self
    }
}

impl QueryMode {
    /// Dynamic operands of the query, in declaration order
    pub fn descriptors(&self) -> Vec<&ValueDescriptor> {
        match self {
            QueryMode::Search { predicates, .. } => predicates
                .iter()
                .filter_map(|p| p.condition.operand())
                .collect(),
            QueryMode::Direct { from, get } => vec![from, get],
        }
    }
}

impl QuerySpec {
    /// Dependencies of the option list (not of the return map, which is
    /// evaluated only on selection)
    pub fn reactive_deps(&self) -> Vec<&FieldPath> {
        self.mode
            .descriptors()
            .into_iter()
            .flat_map(|d| d.reactive_deps())
            .collect()
    }
}

impl Condition {
    pub fn operand(&self) -> Option<&ValueDescriptor> {
        match self {
            Condition::Equals(operand) | Condition::NotEquals(operand) | Condition::Contains(operand) => {
                Some(operand)
            }
            Condition::Exists(_) => None,
        }
    }
}

impl Predicate {
    pub fn new(field: impl Into<FieldPath>, condition: Condition) -> Self {
        Self {
            field: field.into(),
            condition,
        }
    }
}
