//! # Form sessions
//!
//! A [`FormSession`] owns one answer set for one template. The rendering
//! layer drives it through [`start`](FormSession::start),
//! [`on_answer`](FormSession::on_answer),
//! [`on_action`](FormSession::on_action) and
//! [`on_variant_change`](FormSession::on_variant_change); each call returns
//! the value and option updates to push back to the widgets.
//!
//! ## Cascades
//!
//! After a write the session walks the template once in traversal order.
//! A field is recomputed when its dependencies overlap a path written by the
//! trigger or by a field recomputed earlier in the same walk. Each field is
//! recomputed at most once per trigger.
//!
//! ## Lifecycle
//!
//! [`submit`](FormSession::submit) and [`cancel`](FormSession::cancel) consume
//! the session; its answer set and metadata cache go with it.

use crate::config::Configuration;
use crate::dependency::{check_cycles, options_depend_on, value_depends_on};
use crate::error::{ConfigResult, SessionError, SessionResult};
use crate::merge::restore_answers;
use crate::query::{FieldOption, QueryResolver};
use crate::store::DocumentStore;
use crate::variant::{discover_selectors, resolve_variants, VariantSelector};
use chrono::NaiveDate;
use indexmap::IndexMap;
use metaform_evaluator::{
    apply_transform, evaluate, evaluate_computed, pair_with_unit, ContextBundle, Evaluation,
};
use metaform_template::{
    AnswerSet, ContextName, Field, FieldKind, FieldPath, Template, ValueDescriptor,
};
use serde::Serialize;
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Change to push to the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldUpdate {
    /// New value of a path; `null` means the answer was cleared
    Value { path: FieldPath, value: Json },
    Options {
        path: FieldPath,
        options: Vec<FieldOption>,
    },
}

impl FieldUpdate {
    pub fn path(&self) -> &FieldPath {
        match self {
            FieldUpdate::Value { path, .. } | FieldUpdate::Options { path, .. } => path,
        }
    }
}

/// A value that could not be computed and shows its fallback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub path: FieldPath,
    pub message: String,
    pub missing_binding: bool,
}

/// Everything the rendering layer needs to draw one field
#[derive(Debug)]
pub struct FieldState<'a> {
    pub path: FieldPath,
    pub field: &'a Field,
    pub value: Option<&'a Json>,
    pub options: &'a [FieldOption],
    pub diagnostic: Option<&'a Diagnostic>,
}

pub struct FormSession {
    base: Template,
    template: Template,
    selectors: Vec<VariantSelector>,
    answers: AnswerSet,
    settings: Json,
    today: Option<NaiveDate>,
    resolver: QueryResolver,
    options: IndexMap<FieldPath, Vec<FieldOption>>,
    diagnostics: IndexMap<FieldPath, Diagnostic>,
}

impl FormSession {
    pub fn new(base: Template, settings: Json, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            template: base.clone(),
            base,
            selectors: Vec::new(),
            answers: AnswerSet::new(),
            settings,
            today: None,
            resolver: QueryResolver::new(store),
            options: IndexMap::new(),
            diagnostics: IndexMap::new(),
        }
    }

    pub fn from_config(
        config: &Configuration,
        name: &str,
        store: Arc<dyn DocumentStore>,
    ) -> ConfigResult<Self> {
        let template = config.template(name)?.clone();
        Ok(Self::new(template, config.settings.clone(), store))
    }

    /// Pin the date the `date` context treats as today
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn selectors(&self) -> &[VariantSelector] {
        &self.selectors
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.values()
    }

    pub fn options(&self, path: &FieldPath) -> &[FieldOption] {
        self.options.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field_state(&self, path: &FieldPath) -> Option<FieldState<'_>> {
        let field = self.template.field(path)?;
        Some(FieldState {
            path: path.clone(),
            field,
            value: self.answers.get(path),
            options: self.options(path),
            diagnostic: self.diagnostics.get(path),
        })
    }

    /// Apply default variants, then compute initial values and options
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SessionResult<Vec<FieldUpdate>> {
        self.selectors = discover_selectors(&self.base);
        let template = resolve_variants(&self.base, &self.selectors);
        check_cycles(&template)?;
        self.template = template;

        let mut updates = Vec::new();
        let selected: Vec<(FieldPath, String)> = self
            .selectors
            .iter()
            .filter_map(|s| s.selected().map(|name| (s.path().clone(), name.to_string())))
            .collect();
        for (path, name) in selected {
            self.write(&path, Json::String(name), &mut updates);
        }

        self.render(&mut updates).await;
        info!(
            fields = self.template.fields().len(),
            answers = updates.len(),
            "Form session started"
        );
        Ok(updates)
    }

    /// Store a raw answer and recompute what depends on it
    #[instrument(skip(self, raw), fields(path = %path))]
    pub async fn on_answer(&mut self, path: &FieldPath, raw: Json) -> SessionResult<Vec<FieldUpdate>> {
        let field = self
            .template
            .field(path)
            .cloned()
            .ok_or_else(|| SessionError::UnknownField { path: path.clone() })?;

        if field.kind == FieldKind::Variant {
            let name = match &raw {
                Json::String(name) => name.clone(),
                other => other.to_string(),
            };
            return self.on_variant_change(path, &name).await;
        }

        let mut value = raw;
        if let Some(transform) = &field.transform {
            let evaluation = apply_transform(transform, &value, &self.bundle());
            self.note(path, &evaluation);
            value = evaluation.value;
        }
        if let Some(units) = &field.units {
            value = pair_with_unit(&value, units);
        }

        let mut updates = Vec::new();
        let mut written = vec![path.clone()];
        self.write(path, value.clone(), &mut updates);

        if field.kind.is_query() {
            written.extend(self.select_options(path, &field, &value, &mut updates).await);
        }

        self.cascade(&written, &mut updates).await;
        Ok(updates)
    }

    /// Run a field's action and write its result
    #[instrument(skip(self), fields(path = %path))]
    pub async fn on_action(&mut self, path: &FieldPath) -> SessionResult<Vec<FieldUpdate>> {
        let field = self
            .template
            .field(path)
            .ok_or_else(|| SessionError::UnknownField { path: path.clone() })?;
        let action = field
            .action
            .clone()
            .ok_or_else(|| SessionError::NoAction { path: path.clone() })?;

        let mut computed = action.as_computed();
        if !computed.declares(ContextName::Value) {
            computed.contexts.push(ContextName::Value);
        }
        let current = self.answers.get(path).cloned().unwrap_or(Json::Null);
        let evaluation = evaluate_computed(&computed, &self.bundle().with_value(current));
        self.note(path, &evaluation);

        let mut updates = Vec::new();
        if evaluation.is_fallback() {
            debug!(path = %path, "Action failed; nothing written");
            return Ok(updates);
        }

        let target = action.target.clone().unwrap_or_else(|| path.clone());
        self.write(&target, evaluation.value, &mut updates);
        self.cascade(&[target], &mut updates).await;
        Ok(updates)
    }

    /// Switch a variant selector: re-merge from the base template, carry
    /// answers over and re-render
    #[instrument(skip(self), fields(path = %path))]
    pub async fn on_variant_change(
        &mut self,
        path: &FieldPath,
        name: &str,
    ) -> SessionResult<Vec<FieldUpdate>> {
        let index = match self.selectors.iter().position(|s| s.path() == path) {
            Some(index) => index,
            None if self.template.field(path).is_some() => {
                return Err(SessionError::NotAVariantSelector { path: path.clone() })
            }
            None => return Err(SessionError::UnknownField { path: path.clone() }),
        };
        self.selectors[index].select(name)?;

        let next = resolve_variants(&self.base, &self.selectors);
        check_cycles(&next)?;
        let (restored, kept) = restore_answers(&self.template, &next, &self.answers);
        self.template = restored;
        self.answers = kept;

        let template = &self.template;
        self.options.retain(|p, _| template.field(p).is_some());
        self.diagnostics.retain(|p, _| template.field(p).is_some());

        let mut updates = Vec::new();
        self.write(path, Json::String(name.to_string()), &mut updates);
        self.render(&mut updates).await;
        self.cascade(&[path.clone()], &mut updates).await;

        info!(variant = name, fields = self.template.fields().len(), "Variant applied");
        Ok(updates)
    }

    /// The metadata document: the answer tree as JSON
    pub fn submit(self) -> Json {
        info!(diagnostics = self.diagnostics.len(), "Form submitted");
        self.answers.into_value()
    }

    pub fn cancel(self) {
        debug!("Form cancelled");
    }

    fn bundle(&self) -> ContextBundle {
        let bundle = ContextBundle::from_answers(&self.answers).with_settings(self.settings.clone());
        match self.today {
            Some(today) => bundle.with_today(today),
            None => bundle,
        }
    }

    fn fields(&self) -> Vec<(FieldPath, Field)> {
        self.template
            .fields()
            .into_iter()
            .map(|(path, field)| (path, field.clone()))
            .collect()
    }

    fn write(&mut self, path: &FieldPath, value: Json, updates: &mut Vec<FieldUpdate>) {
        if value.is_null() {
            self.answers.remove(path);
        } else {
            self.answers.set(path, value.clone());
        }
        updates.push(FieldUpdate::Value {
            path: path.clone(),
            value,
        });
    }

    fn note(&mut self, path: &FieldPath, evaluation: &Evaluation) {
        match &evaluation.error {
            Some(err) => {
                self.diagnostics.insert(
                    path.clone(),
                    Diagnostic {
                        path: path.clone(),
                        message: err.to_string(),
                        missing_binding: err.is_missing_binding(),
                    },
                );
            }
            None => {
                self.diagnostics.shift_remove(path);
            }
        }
    }

    /// Evaluate a field's value descriptor against the current answers
    fn compute_value(&mut self, path: &FieldPath, field: &Field, descriptor: &ValueDescriptor) -> Json {
        let evaluation = evaluate(descriptor, &self.bundle());
        self.note(path, &evaluation);
        match &field.units {
            Some(units) => pair_with_unit(&evaluation.value, units),
            None => evaluation.value,
        }
    }

    /// Initial values for unanswered fields, and every option list
    async fn render(&mut self, updates: &mut Vec<FieldUpdate>) {
        for (path, field) in self.fields() {
            if field.kind != FieldKind::Variant && !field.kind.is_query() && !self.answers.contains(&path) {
                if let Some(descriptor) = &field.value {
                    let value = self.compute_value(&path, &field, descriptor);
                    if !value.is_null() {
                        self.write(&path, value, updates);
                    }
                }
            }

            if self.refresh_options(&path, &field, updates).await && field.kind.is_query() {
                self.apply_query_default(&path, &field, updates).await;
            }
        }
    }

    /// A literal default naming one of the resolved options selects it
    async fn apply_query_default(&mut self, path: &FieldPath, field: &Field, updates: &mut Vec<FieldUpdate>) {
        if self.answers.contains(path) {
            return;
        }
        let Some(ValueDescriptor::Literal(default)) = &field.value else {
            return;
        };
        let wanted: Vec<&Json> = match default {
            Json::Array(items) if field.kind.is_multi() => items.iter().collect(),
            single => vec![single],
        };
        let known = wanted
            .iter()
            .all(|w| self.options(path).iter().any(|o| o.matches(w)));
        if wanted.is_empty() || !known {
            return;
        }

        debug!(path = %path, "Selecting query default");
        self.write(path, default.clone(), updates);
        let written = self.select_options(path, field, default, updates).await;
        if !written.is_empty() {
            let mut triggers = vec![path.clone()];
            triggers.extend(written);
            self.cascade(&triggers, updates).await;
        }
    }

    /// Recompute a field's option list; true when the field has one
    async fn refresh_options(&mut self, path: &FieldPath, field: &Field, updates: &mut Vec<FieldUpdate>) -> bool {
        let bundle = self.bundle();
        let options = if let (true, Some(query)) = (field.kind.is_query(), &field.query) {
            self.resolver.resolve(query, &bundle).await
        } else if let Some(descriptor) = &field.options {
            let evaluation = evaluate(descriptor, &bundle);
            self.note(path, &evaluation);
            match evaluation.value {
                Json::Array(items) => items.iter().map(|item| FieldOption::from_item(item, None)).collect(),
                _ => Vec::new(),
            }
        } else {
            return false;
        };

        self.options.insert(path.clone(), options.clone());
        updates.push(FieldUpdate::Options {
            path: path.clone(),
            options,
        });
        true
    }

    /// Write the return map of the options matching `answer`; returns the
    /// paths written
    async fn select_options(
        &mut self,
        path: &FieldPath,
        field: &Field,
        answer: &Json,
        updates: &mut Vec<FieldUpdate>,
    ) -> Vec<FieldPath> {
        let Some(query) = &field.query else {
            return Vec::new();
        };
        let chosen: Vec<FieldOption> = match answer {
            Json::Array(items) => self
                .options(path)
                .iter()
                .filter(|o| items.iter().any(|item| o.matches(item)))
                .cloned()
                .collect(),
            single => self
                .options(path)
                .iter()
                .filter(|o| o.matches(single))
                .take(1)
                .cloned()
                .collect(),
        };
        if chosen.is_empty() {
            debug!(path = %path, "Answer matches no resolved option");
            return Vec::new();
        }

        let bundle = self.bundle();
        let pairs = self.resolver.select(query, &chosen, &bundle).await;
        let mut written = Vec::with_capacity(pairs.len());
        for (target, value) in pairs {
            self.write(&target, value, updates);
            written.push(target);
        }
        written
    }

    /// One forward pass over the template recomputing dependents of
    /// `triggers`
    async fn cascade(&mut self, triggers: &[FieldPath], updates: &mut Vec<FieldUpdate>) {
        let mut changed: Vec<FieldPath> = triggers.to_vec();

        for (path, field) in self.fields() {
            if triggers.contains(&path) {
                continue;
            }

            let value_hit = changed.iter().any(|c| value_depends_on(&field, c));
            if value_hit {
                if let Some(descriptor) = &field.value {
                    let value = self.compute_value(&path, &field, descriptor);
                    if self.answers.get(&path).unwrap_or(&Json::Null) != &value {
                        debug!(path = %path, "Recomputed dependent field");
                        self.write(&path, value, updates);
                        changed.push(path.clone());
                    }
                }
            }

            let options_hit = changed.iter().any(|c| options_depend_on(&field, c));
            if options_hit {
                self.refresh_options(&path, &field, updates).await;
            }
        }
    }
}
