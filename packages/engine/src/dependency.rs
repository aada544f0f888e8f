//! Reactive dependency tracking
//!
//! Finds the fields whose computed defaults must be recomputed after an
//! answer changes, and rejects templates whose value dependencies form a
//! cycle.

use metaform_template::{Field, FieldPath, Template, TemplateError, TemplateResult};
use std::collections::{HashMap, HashSet};

/// True when a change at `changed` invalidates the field's value
pub fn value_depends_on(field: &Field, changed: &FieldPath) -> bool {
    field.reactive_deps().iter().any(|dep| dep.overlaps(changed))
}

/// True when a change at `changed` invalidates the field's option list
pub fn options_depend_on(field: &Field, changed: &FieldPath) -> bool {
    field.option_deps().into_iter().any(|dep| dep.overlaps(changed))
}

/// Fields whose value descriptor depends on `changed`, in traversal order.
///
/// A dependency matches when it names `changed`, a descendant of it
/// (changing `project` affects a dependency on `project.name`) or an
/// ancestor of it (changing `project.name` affects a dependency on
/// `project`).
pub fn affected_fields(template: &Template, changed: &FieldPath) -> Vec<FieldPath> {
    template
        .fields()
        .into_iter()
        .filter(|(_, field)| value_depends_on(field, changed))
        .map(|(path, _)| path)
        .collect()
}

/// Fields whose option list depends on `changed`, in traversal order
pub fn affected_options(template: &Template, changed: &FieldPath) -> Vec<FieldPath> {
    template
        .fields()
        .into_iter()
        .filter(|(_, field)| options_depend_on(field, changed))
        .map(|(path, _)| path)
        .collect()
}

/// Field-level graph of value dependencies (field -> fields it reads)
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    /// Field paths in traversal order
    order: Vec<FieldPath>,

    dependencies: HashMap<FieldPath, Vec<FieldPath>>,

    /// Reverse lookup: field -> fields that read it
    dependents: HashMap<FieldPath, Vec<FieldPath>>,
}

impl DependencyGraph {
    pub fn from_template(template: &Template) -> Self {
        let fields = template.fields();
        let order: Vec<FieldPath> = fields.iter().map(|(path, _)| path.clone()).collect();
        let mut graph = Self {
            order,
            ..Self::default()
        };

        for (path, field) in &fields {
            for dep in field.reactive_deps() {
                // A dependency names a field, a group of fields, or a
                // location inside a field's value. A group dependency does
                // not make a field depend on itself.
                for target in graph.order.clone() {
                    let reads_self = target == *path && dep != path;
                    if target.overlaps(dep) && !reads_self {
                        graph.add_dependency(path.clone(), target);
                    }
                }
            }
        }

        graph
    }

    pub fn add_dependency(&mut self, source: FieldPath, target: FieldPath) {
        let targets = self.dependencies.entry(source.clone()).or_default();
        if targets.contains(&target) {
            return;
        }
        targets.push(target.clone());
        self.dependents.entry(target).or_default().push(source);
    }

    pub fn dependencies_of(&self, path: &FieldPath) -> &[FieldPath] {
        self.dependencies.get(path).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn dependents_of(&self, path: &FieldPath) -> &[FieldPath] {
        self.dependents.get(path).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Detect cycles using DFS; the error lists the cycle, closed on its
    /// first field
    pub fn detect_cycles(&self) -> TemplateResult<()> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for field in &self.order {
            if !visited.contains(field) {
                self.dfs_detect_cycle(field, &mut visited, &mut stack)?;
            }
        }

        Ok(())
    }

    fn dfs_detect_cycle(
        &self,
        node: &FieldPath,
        visited: &mut HashSet<FieldPath>,
        stack: &mut Vec<FieldPath>,
    ) -> TemplateResult<()> {
        visited.insert(node.clone());
        stack.push(node.clone());

        for dep in self.dependencies_of(node) {
            if let Some(start) = stack.iter().position(|p| p == dep) {
                let mut cycle = stack[start..].to_vec();
                cycle.push(dep.clone());
                return Err(TemplateError::DependencyCycle { cycle });
            }
            if !visited.contains(dep) {
                self.dfs_detect_cycle(dep, visited, stack)?;
            }
        }

        stack.pop();
        Ok(())
    }
}

/// Reject templates whose value dependencies are cyclic
pub fn check_cycles(template: &Template) -> TemplateResult<()> {
    DependencyGraph::from_template(template).detect_cycles()
}
