// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow template rendering.

use anvil_core::{HardwareSpec, WorkflowSpec};
use indexmap::IndexMap;
use minijinja::{context, Environment, UndefinedBehavior};
use thiserror::Error;

use crate::functions;

/// A failed render. Terminal for the pipeline; the underlying message is
/// surfaced verbatim as the failure reason.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to marshal template: {0}")]
    Marshal(#[source] serde_yaml::Error),

    #[error("template parse error: {0}")]
    Parse(#[source] minijinja::Error),

    #[error("template execute error: {0}")]
    Execute(#[source] minijinja::Error),

    #[error("rendered template is not valid YAML: {0}")]
    Unmarshal(#[source] serde_yaml::Error),

    #[error("rendered workflow is invalid: {0}")]
    Invalid(#[from] anvil_core::ValidationError),

    #[error("action name {rendered:?} does not match template name {template:?}: action names must be literal")]
    ActionNameNotLiteral { template: String, rendered: String },
}

/// Render `template` against a hardware spec and merged params, producing
/// the rendered YAML text. Deterministic: identical inputs yield
/// byte-identical output.
pub fn rendered_yaml(
    template: &WorkflowSpec,
    hardware: &HardwareSpec,
    params: &IndexMap<String, String>,
) -> Result<String, RenderError> {
    let source = serde_yaml::to_string(template).map_err(RenderError::Marshal)?;

    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    functions::register(&mut env);
    env.add_template("workflow", &source)
        .map_err(RenderError::Parse)?;

    let compiled = env.get_template("workflow").map_err(RenderError::Parse)?;
    compiled
        .render(context! {
            Hardware => hardware,
            Param => params,
        })
        .map_err(RenderError::Execute)
}

/// Render `template` and unmarshal the result back into a workflow spec.
///
/// Action names must come through the render byte-identical: they are
/// execution identifiers, not templated values.
pub fn render(
    template: &WorkflowSpec,
    hardware: &HardwareSpec,
    params: &IndexMap<String, String>,
) -> Result<WorkflowSpec, RenderError> {
    let yaml = rendered_yaml(template, hardware, params)?;
    let rendered: WorkflowSpec = serde_yaml::from_str(&yaml).map_err(RenderError::Unmarshal)?;

    rendered.validate()?;
    for (templated, result) in template.actions.iter().zip(rendered.actions.iter()) {
        if templated.name != result.name {
            return Err(RenderError::ActionNameNotLiteral {
                template: templated.name.clone(),
                rendered: result.name.clone(),
            });
        }
    }

    Ok(rendered)
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
