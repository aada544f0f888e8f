use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Lexical bindings; arrow functions extend the scope they were created in
#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn root(bindings: HashMap<String, Value>) -> Arc<Self> {
        Arc::new(Self {
            bindings,
            parent: None,
        })
    }

    pub fn child(parent: &Arc<Scope>, bindings: HashMap<String, Value>) -> Arc<Self> {
        Arc::new(Self {
            bindings,
            parent: Some(Arc::clone(parent)),
        })
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|p| p.lookup(name)),
        }
    }
}
