//! # Document query resolution
//!
//! Turns a field's [`QuerySpec`] into an option list by reading the injected
//! [`DocumentStore`], and turns a chosen option into `(target, value)` pairs
//! through the query's return map.
//!
//! Resolution never fails. A store error, an unresolvable document or an
//! empty match all yield an empty option list, and a candidate whose
//! predicate cannot be evaluated is excluded rather than aborting the query.

use crate::store::{Document, DocumentStore};
use metaform_evaluator::{evaluate, ContextBundle};
use metaform_template::{Condition, FieldPath, Predicate, QueryMode, QuerySpec, ValueDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One selectable option of a choice or query field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: Json,
    /// Source document, for options produced by a query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

impl FieldOption {
    /// Option from an evaluated list item: strings label themselves, objects
    /// may carry `label` / `value`, anything else is labelled by its JSON
    pub fn from_item(item: &Json, document: Option<&str>) -> Self {
        let label = match item {
            Json::String(s) => s.clone(),
            Json::Object(map) => match map.get("label").or_else(|| map.get("name")) {
                Some(Json::String(s)) => s.clone(),
                _ => item.to_string(),
            },
            other => other.to_string(),
        };
        let value = match item {
            Json::Object(map) => map.get("value").cloned().unwrap_or_else(|| item.clone()),
            other => other.clone(),
        };
        Self {
            label,
            value,
            document: document.map(str::to_string),
        }
    }

    /// True when `answer` names this option by label or by value
    pub fn matches(&self, answer: &Json) -> bool {
        match answer {
            Json::String(s) if s == &self.label => true,
            other => other == &self.value,
        }
    }
}

/// Structured metadata read during one session, keyed by document path
#[derive(Debug, Default, Clone)]
pub struct MetadataCache {
    entries: HashMap<String, Option<Json>>,
}

impl MetadataCache {
    pub fn get(&self, path: &str) -> Option<&Option<Json>> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: String, metadata: Option<Json>) {
        self.entries.insert(path, metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct QueryResolver {
    store: Arc<dyn DocumentStore>,
    cache: MetadataCache,
}

impl QueryResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: MetadataCache::default(),
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Structured metadata of `path`, read from the store at most once
    pub async fn metadata(&mut self, path: &str) -> Option<Json> {
        if let Some(cached) = self.cache.get(path) {
            return cached.clone();
        }
        let metadata = match self.store.get_structured_metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(path, error = %err, "Failed to load document metadata");
                None
            }
        };
        self.cache.insert(path.to_string(), metadata.clone());
        metadata
    }

    /// Evaluate the query to its option list
    pub async fn resolve(&mut self, spec: &QuerySpec, bundle: &ContextBundle) -> Vec<FieldOption> {
        match &spec.mode {
            QueryMode::Search {
                source_tag,
                predicates,
            } => self.resolve_search(source_tag, predicates, bundle).await,
            QueryMode::Direct { from, get } => {
                let Some(path) = self.resolve_from(from, bundle) else {
                    return Vec::new();
                };
                let Some(metadata) = self.metadata(&path).await else {
                    debug!(path = %path, "Direct query document not found");
                    return Vec::new();
                };
                let result = evaluate(get, &bundle.clone().with_frontmatter(metadata));
                if result.is_fallback() {
                    return Vec::new();
                }
                match result.value {
                    Json::Array(items) => items
                        .iter()
                        .map(|item| FieldOption::from_item(item, Some(&path)))
                        .collect(),
                    Json::Null => Vec::new(),
                    item => vec![FieldOption::from_item(&item, Some(&path))],
                }
            }
        }
    }

    async fn resolve_search(
        &mut self,
        source_tag: &str,
        predicates: &[Predicate],
        bundle: &ContextBundle,
    ) -> Vec<FieldOption> {
        let documents = match self.store.list_documents_by_tag(source_tag).await {
            Ok(documents) => documents,
            Err(err) => {
                warn!(tag = source_tag, error = %err, "Failed to list documents");
                return Vec::new();
            }
        };

        let mut options = Vec::new();
        for document in documents {
            let metadata = self.metadata(&document.path).await.unwrap_or(Json::Null);
            if !self.matches_all(&document, &metadata, predicates, bundle) {
                continue;
            }
            let label = self.store.resolve_display_name(&document).await;
            options.push(FieldOption {
                value: Json::String(label.clone()),
                label,
                document: Some(document.path),
            });
        }

        debug!(tag = source_tag, matches = options.len(), "Search query resolved");
        options
    }

    fn matches_all(
        &self,
        document: &Document,
        metadata: &Json,
        predicates: &[Predicate],
        bundle: &ContextBundle,
    ) -> bool {
        let candidate = bundle.clone().with_frontmatter(metadata.clone());
        predicates.iter().all(|predicate| {
            let actual = lookup(metadata, &predicate.field);
            let operand = match predicate.condition.operand() {
                Some(descriptor) => {
                    let result = evaluate(descriptor, &candidate);
                    if let Some(err) = result.error {
                        debug!(
                            document = %document.path,
                            field = %predicate.field,
                            error = %err,
                            "Predicate operand failed; excluding document"
                        );
                        return false;
                    }
                    result.value
                }
                None => Json::Null,
            };
            test_condition(&predicate.condition, actual, &operand)
        })
    }

    fn resolve_from(&self, from: &ValueDescriptor, bundle: &ContextBundle) -> Option<String> {
        let result = evaluate(from, bundle);
        let failed = result.is_fallback();
        match result.value {
            Json::String(path) if !failed && !path.is_empty() => Some(path),
            other => {
                debug!(value = %other, "Direct query source did not resolve to a document path");
                None
            }
        }
    }

    /// Evaluate the return map for the chosen option(s)
    pub async fn select(
        &mut self,
        spec: &QuerySpec,
        chosen: &[FieldOption],
        bundle: &ContextBundle,
    ) -> Vec<(FieldPath, Json)> {
        if spec.return_map.is_empty() || chosen.is_empty() {
            return Vec::new();
        }

        let mut documents = Vec::with_capacity(chosen.len());
        for option in chosen {
            let metadata = match &option.document {
                Some(path) => self.metadata(path).await.unwrap_or(Json::Null),
                None => Json::Null,
            };
            documents.push(metadata);
        }

        let (selection, frontmatter) = if chosen.len() == 1 {
            (chosen[0].value.clone(), documents.swap_remove(0))
        } else {
            (
                Json::Array(chosen.iter().map(|o| o.value.clone()).collect()),
                Json::Array(documents),
            )
        };

        let bundle = bundle
            .clone()
            .with_selection(selection)
            .with_frontmatter(frontmatter);

        spec.return_map
            .iter()
            .map(|(target, descriptor)| (target.clone(), evaluate(descriptor, &bundle).value))
            .collect()
    }
}

/// Value at a dotted path inside document metadata
pub fn lookup<'a>(metadata: &'a Json, path: &FieldPath) -> Option<&'a Json> {
    let mut current = metadata;
    for segment in path.segments() {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn test_condition(condition: &Condition, actual: Option<&Json>, operand: &Json) -> bool {
    match condition {
        Condition::Exists(expected) => actual.map(|v| !v.is_null()).unwrap_or(false) == *expected,
        Condition::Equals(_) => actual.map(|v| json_eq(v, operand)).unwrap_or(false),
        Condition::NotEquals(_) => !actual.map(|v| json_eq(v, operand)).unwrap_or(false),
        Condition::Contains(_) => match actual {
            Some(Json::Array(items)) => match operand {
                Json::Array(wanted) => wanted.iter().all(|w| items.iter().any(|i| json_eq(i, w))),
                single => items.iter().any(|i| json_eq(i, single)),
            },
            Some(Json::String(text)) => match operand {
                Json::String(needle) => text.contains(needle.as_str()),
                _ => false,
            },
            _ => false,
        },
    }
}

/// JSON equality that treats `3` and `3.0` as equal
fn json_eq(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => x.as_f64() == y.as_f64(),
        (Json::Array(x), Json::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Json::Object(x), Json::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => a == b,
    }
}
