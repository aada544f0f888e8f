//! Structural edits that specialize a base template into a variant

use crate::path::FieldPath;
use crate::template::TemplateNode;
use serde::{Deserialize, Serialize};

/// Where an added node lands relative to an existing sibling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionHint {
    Before(String),
    After(String),
}

/// One structural edit keyed by dotted path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum SubclassOperation {
    Add {
        path: FieldPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<PositionHint>,
        field: TemplateNode,
    },
    Remove {
        path: FieldPath,
    },
    #[serde(rename_all = "camelCase")]
    Replace {
        path: FieldPath,
        new_path: FieldPath,
        field: TemplateNode,
    },
}

impl SubclassOperation {
    pub fn add(path: impl Into<FieldPath>, field: impl Into<TemplateNode>) -> Self {
        SubclassOperation::Add {
            path: path.into(),
            position: None,
            field: field.into(),
        }
    }

    pub fn add_at(
        path: impl Into<FieldPath>,
        position: PositionHint,
        field: impl Into<TemplateNode>,
    ) -> Self {
        SubclassOperation::Add {
            path: path.into(),
            position: Some(position),
            field: field.into(),
        }
    }

    pub fn remove(path: impl Into<FieldPath>) -> Self {
        SubclassOperation::Remove { path: path.into() }
    }

    pub fn replace(
        path: impl Into<FieldPath>,
        new_path: impl Into<FieldPath>,
        field: impl Into<TemplateNode>,
    ) -> Self {
        SubclassOperation::Replace {
            path: path.into(),
            new_path: new_path.into(),
            field: field.into(),
        }
    }

    pub fn path(&self) -> &FieldPath {
        match self {
            SubclassOperation::Add { path, .. }
            | SubclassOperation::Remove { path }
            | SubclassOperation::Replace { path, .. } => path,
        }
    }
}
