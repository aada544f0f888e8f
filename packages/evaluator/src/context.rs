use crate::value::{DateHelper, Value};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use metaform_template::{AnswerSet, ContextName};
use serde_json::Value as Json;

/// Everything a computed descriptor may read, assembled by the caller.
///
/// Only the contexts a descriptor declares are bound when it is evaluated;
/// `frontmatter`, `selection` and `value` exist only when supplied.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    user_input: Json,
    settings: Json,
    frontmatter: Option<Json>,
    selection: Option<Json>,
    value: Option<Json>,
    now: NaiveDateTime,
}

impl Default for ContextBundle {
    fn default() -> Self {
        Self {
            user_input: Json::Object(Default::default()),
            settings: Json::Object(Default::default()),
            frontmatter: None,
            selection: None,
            value: None,
            now: Local::now().naive_local(),
        }
    }
}

impl ContextBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_answers(answers: &AnswerSet) -> Self {
        Self::default().with_user_input(answers.to_value())
    }

    pub fn with_user_input(mut self, user_input: Json) -> Self {
        self.user_input = user_input;
        self
    }

    pub fn with_settings(mut self, settings: Json) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_frontmatter(mut self, frontmatter: Json) -> Self {
        self.frontmatter = Some(frontmatter);
        self
    }

    pub fn with_selection(mut self, selection: Json) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_value(mut self, value: Json) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Pin the clock to midnight of `today`
    pub fn with_today(self, today: NaiveDate) -> Self {
        self.with_now(today.and_time(NaiveTime::default()))
    }

    pub fn user_input(&self) -> &Json {
        &self.user_input
    }

    pub fn settings(&self) -> &Json {
        &self.settings
    }

    pub fn frontmatter(&self) -> Option<&Json> {
        self.frontmatter.as_ref()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Runtime value bound to `context`, if the bundle supplies one
    pub fn binding(&self, context: ContextName) -> Option<Value> {
        match context {
            ContextName::UserInput => Some(Value::from_json(&self.user_input)),
            ContextName::Settings => Some(Value::from_json(&self.settings)),
            ContextName::Date => Some(Value::Date(DateHelper { now: self.now })),
            ContextName::Frontmatter => self.frontmatter.as_ref().map(Value::from_json),
            ContextName::Selection => self.selection.as_ref().map(Value::from_json),
            ContextName::Value => self.value.as_ref().map(Value::from_json),
        }
    }
}
