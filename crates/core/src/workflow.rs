// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow templates: reusable, ordered lists of containerized actions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::meta::{Object, ObjectMeta};
use crate::validation::ValidationError;

/// A reusable set of actions, rendered against hardware and user data
/// before execution. Most string fields may contain template expressions;
/// action names may not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: WorkflowSpec,
}

impl Object for Workflow {
    const KIND: &'static str = "Workflow";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.spec.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    /// Actions to run, strictly in order. At least one is required; names
    /// must be unique within the workflow.
    #[serde(default)]
    pub actions: Vec<Action>,

    /// Volumes mounted into every action. An action declaring the same
    /// target takes precedence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    /// Environment variables available in every action. Action-level
    /// variables of the same name win.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Logging configuration for all action containers. Runtime specific;
    /// the runtime default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Logging>,
}

impl WorkflowSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.actions.is_empty() {
            return Err(ValidationError::NoActions);
        }
        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.name.as_str()) {
                return Err(ValidationError::DuplicateActionName {
                    name: action.name.clone(),
                });
            }
            action.validate()?;
        }
        Ok(())
    }
}

/// One containerized step of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,

    /// Fully qualified OCI image name.
    pub image: String,

    /// Overrides the default command of the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Volumes in `SRC:DST[:OPTIONS]` form.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    /// Linux namespaces the container should execute in.
    #[serde(default, rename = "namespaces", skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,

    /// Seconds the action has to complete, counted from when the action is
    /// requested. 0 means no timeout.
    #[serde(default, rename = "timeout")]
    pub timeout_seconds: u64,

    /// Run detached: the agent reports the action as succeeded as soon as
    /// the container starts.
    #[serde(default)]
    pub background: bool,

    /// Extra attempts on non-zero exit codes. Timeouts are never retried.
    #[serde(default)]
    pub retries: u32,
}

impl Action {
    fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |message: &str| ValidationError::InvalidAction {
            name: self.name.clone(),
            message: message.to_string(),
        };
        if self.name.is_empty() {
            return Err(ValidationError::InvalidAction {
                name: String::new(),
                message: "name must not be empty".to_string(),
            });
        }
        if self.image.is_empty() {
            return Err(invalid("image must not be empty"));
        }
        Ok(())
    }
}

/// Linux namespace overrides for an action container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
}

/// Logging driver configuration for action containers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logging {
    pub driver: String,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, String>,
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
