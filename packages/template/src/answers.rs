use crate::path::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nested mapping of field paths to answered values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    values: Map<String, Value>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object; non-objects yield an empty set
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.values.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.get(path).is_some()
    }

    /// Write a value, replacing non-object intermediates with objects
    pub fn set(&mut self, path: &FieldPath, value: Value) {
        let Some((last, parents)) = path.segments().split_last() else {
            return;
        };

        let mut current = &mut self.values;
        for segment in parents {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = match slot {
                Value::Object(map) => map,
                _ => return,
            };
        }
        current.insert(last.clone(), value);
    }

    pub fn remove(&mut self, path: &FieldPath) -> Option<Value> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = &mut self.values;
        for segment in parents {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        current.remove(last)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}
