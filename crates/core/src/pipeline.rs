// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipelines: one-shot executions binding a workflow template to a hardware
//! and an agent, with the status machine the agent reports into.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::condition::Conditions;
use crate::meta::{Object, ObjectMeta};
use crate::validation::ValidationError;
use crate::workflow::Action;

/// Overall state of a pipeline.
///
/// Preparing → Pending → Scheduled → Running → Succeeded | Failed, with
/// Cancelling reachable from any non-terminal state and draining to
/// Canceled once the agent confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// Rendering and boot prerequisites are in progress.
    Preparing,
    /// Ready and awaiting agent pickup.
    Pending,
    /// Dispatched to the agent; no action has reported yet.
    Scheduled,
    /// At least one action has begun executing.
    Running,
    /// The agent has been instructed to cancel but has not yet confirmed.
    Cancelling,
    /// All actions completed successfully.
    Succeeded,
    /// An action failed, a boot job failed, rendering failed, or the
    /// pipeline timed out.
    Failed,
    /// Cancellation confirmed by the agent.
    Canceled,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded | PipelineState::Failed | PipelineState::Canceled
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Preparing => "Preparing",
            PipelineState::Pending => "Pending",
            PipelineState::Scheduled => "Scheduled",
            PipelineState::Running => "Running",
            PipelineState::Cancelling => "Cancelling",
            PipelineState::Succeeded => "Succeeded",
            PipelineState::Failed => "Failed",
            PipelineState::Canceled => "Canceled",
        };
        write!(f, "{}", s)
    }
}

/// Point-in-time state of a single action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionState::Pending => "Pending",
            ActionState::Running => "Running",
            ActionState::Succeeded => "Succeeded",
            ActionState::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of template rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowRenderingState {
    #[default]
    Unknown,
    Succeeded,
    Failed,
}

/// The kind of booting the hardware is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    Netboot,
    Isoboot,
}

/// Options controlling how the hardware is booted for a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootOptions {
    /// Toggle the hardware's PXE allowance around execution: enabled before
    /// the workflow runs, disabled after it completes successfully.
    #[serde(default)]
    pub toggle_allow_netboot: bool,

    /// ISO to one-time boot. Requires hardware with a BMC reference.
    #[serde(default, rename = "isoURL", skip_serializing_if = "Option::is_none")]
    pub iso_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_mode: Option<BootMode>,
}

impl BootOptions {
    /// The ISO to boot: the explicit URL, falling back to the hardware OSIE.
    pub fn resolved_iso_url<'a>(&'a self, hardware_iso: Option<&'a str>) -> Option<&'a str> {
        self.iso_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(hardware_iso)
    }

    /// True when these options require a one-shot CDROM boot job.
    pub fn wants_iso_boot(&self) -> bool {
        self.iso_url.as_deref().is_some_and(|u| !u.is_empty())
            || self.boot_mode == Some(BootMode::Isoboot)
    }

    /// True when these options require any BMC interaction before the
    /// pipeline may leave Preparing.
    pub fn requires_bmc(&self) -> bool {
        self.toggle_allow_netboot || self.wants_iso_boot()
    }
}

/// One workflow execution entry within a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineWorkflow {
    /// Identity of the agent that will execute this workflow.
    pub agent_id: String,

    /// Boot options for this workflow, overriding the pipeline-level ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_options: Option<BootOptions>,

    /// Name of the workflow template to render.
    pub workflow_ref: String,

    /// Name of the hardware this workflow executes on.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hardware_ref: String,

    /// Key-value pairs injected at render time under the `Param` root.
    /// Merged over the pipeline-level params; these win on conflict.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub template_params: IndexMap<String, String>,

    /// Seconds this workflow has to complete. 0 disables the timeout.
    #[serde(default, rename = "timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    /// Boot options applied to all workflows unless overridden per entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_options: Option<BootOptions>,

    /// Params injected into all workflows at render time.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub template_params: IndexMap<String, String>,

    /// Seconds the whole pipeline has to complete, counted from the first
    /// action request. 0 disables the timeout.
    #[serde(default, rename = "timeout")]
    pub timeout_seconds: u64,

    pub workflows: Vec<PipelineWorkflow>,
}

impl PipelineSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workflows.is_empty() {
            return Err(ValidationError::NoWorkflows);
        }
        for (index, entry) in self.workflows.iter().enumerate() {
            if entry.agent_id.is_empty() {
                return Err(ValidationError::InvalidWorkflowEntry {
                    index,
                    message: "agentId must not be empty".to_string(),
                });
            }
            if entry.workflow_ref.is_empty() {
                return Err(ValidationError::InvalidWorkflowEntry {
                    index,
                    message: "workflowRef must not be empty".to_string(),
                });
            }
            if self.boot_options_for(index).is_some_and(|b| b.requires_bmc())
                && entry.hardware_ref.is_empty()
            {
                return Err(ValidationError::InvalidWorkflowEntry {
                    index,
                    message: "bootOptions require a hardwareRef".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Effective boot options for a workflow entry: the entry's own, falling
    /// back to the pipeline-level options.
    pub fn boot_options_for(&self, index: usize) -> Option<&BootOptions> {
        self.workflows
            .get(index)
            .and_then(|w| w.boot_options.as_ref())
            .or(self.boot_options.as_ref())
    }

    /// Render params for a workflow entry: pipeline-level first, entry-level
    /// merged over them.
    pub fn params_for(&self, index: usize) -> IndexMap<String, String> {
        let mut merged = self.template_params.clone();
        if let Some(entry) = self.workflows.get(index) {
            for (k, v) in &entry.template_params {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }
}

/// Status of one rendered action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStatus {
    /// Generated identifier unique to this action status.
    pub id: String,

    /// Pipeline workflow entry this action belongs to.
    #[serde(rename = "workflowID")]
    pub workflow_id: String,

    /// Agent that will execute the action.
    #[serde(rename = "agentID")]
    pub agent_id: String,

    /// The action after template rendering.
    pub rendered: Action,

    #[serde(default)]
    pub state: ActionState,

    /// When the action started, by the server clock. None until it starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, rename = "lastTransitioned", skip_serializing_if = "Option::is_none")]
    pub last_transition: Option<DateTime<Utc>>,

    /// Execution duration in seconds, computed when the action terminates.
    #[serde(default)]
    pub seconds: i64,

    /// Short CamelCase word describing why the action failed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_reason: String,

    /// Free-form elaboration on the failure reason.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_message: String,
}

impl ActionStatus {
    /// Move to `state`, keeping `last_transition` non-decreasing.
    pub fn transition(&mut self, state: ActionState, now: DateTime<Utc>) {
        self.state = state;
        match self.last_transition {
            Some(prev) if prev > now => {}
            _ => self.last_transition = Some(now),
        }
    }
}

/// State of the controller's PXE-allowance interactions for a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowNetbootStatus {
    #[serde(default)]
    pub toggled_true: bool,

    #[serde(default)]
    pub toggled_false: bool,
}

/// Snapshot of one BMC job created on behalf of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// UID of the created job object. Job names are fixed per hardware and
    /// role, so the UID distinguishes recreations.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    /// The job reported its conditions as complete.
    #[serde(default)]
    pub complete: bool,

    /// An existing job with the fixed name was deleted to make room.
    #[serde(default)]
    pub existing_job_deleted: bool,
}

/// State of any boot options being driven for the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootOptionsStatus {
    #[serde(default)]
    pub allow_netboot: AllowNetbootStatus,

    /// Per-role snapshots of owned BMC jobs.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub jobs: IndexMap<String, JobStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    /// Flat ordered list of rendered action statuses.
    #[serde(default)]
    pub actions: Vec<ActionStatus>,

    /// When the first action was requested. None until started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, rename = "lastTransitioned", skip_serializing_if = "Option::is_none")]
    pub last_transition: Option<DateTime<Utc>>,

    /// Overall pipeline state. None until the first reconcile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PipelineState>,

    /// Workflow entry currently executing.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_workflow: String,

    /// Action currently executing.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_action: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_hardware: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_agent: String,

    #[serde(default)]
    pub boot_options: BootOptionsStatus,

    #[serde(default)]
    pub workflow_rendering: WorkflowRenderingState,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_reason: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_message: String,

    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        self.state.is_some_and(|s| s.is_terminal())
    }

    /// Index of the current action within the flat list.
    pub fn current_action_index(&self) -> Option<usize> {
        self.actions.iter().position(|a| {
            a.workflow_id == self.current_workflow && a.rendered.name == self.current_action
        })
    }

    pub fn total_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn current_action_status(&self) -> Option<&ActionStatus> {
        self.current_action_index().map(|i| &self.actions[i])
    }

    pub fn current_action_status_mut(&mut self) -> Option<&mut ActionStatus> {
        let index = self.current_action_index()?;
        self.actions.get_mut(index)
    }

    pub fn all_actions_succeeded(&self) -> bool {
        !self.actions.is_empty()
            && self
                .actions
                .iter()
                .all(|a| a.state == ActionState::Succeeded)
    }

    pub fn any_action_failed(&self) -> bool {
        self.actions.iter().any(|a| a.state == ActionState::Failed)
    }

    /// Move to `state`, stamping `last_transition` only on change.
    pub fn transition(&mut self, state: PipelineState, now: DateTime<Utc>) {
        if self.state != Some(state) {
            self.state = Some(state);
            self.last_transition = Some(now);
        }
    }
}

/// An executing instance binding a workflow template to a hardware and an
/// agent. Pipelines execute once and should be considered ephemeral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PipelineSpec,

    #[serde(default)]
    pub status: PipelineStatus,
}

impl Object for Pipeline {
    const KIND: &'static str = "Pipeline";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.spec.validate()
    }

    // A delete request on a pipeline that is still executing becomes a
    // cancellation: the object stays behind with the deletion timestamp set
    // and the reconciler drives Cancelling → Canceled.
    fn begin_deletion(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_terminal() || self.metadata.deletion_requested() {
            return false;
        }
        self.metadata.deletion_timestamp = Some(now);
        true
    }
}

impl Pipeline {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the pipeline's timeout has elapsed relative to `now`.
    pub fn timed_out(&self, now: DateTime<Utc>) -> bool {
        if self.spec.timeout_seconds == 0 {
            return false;
        }
        match self.status.started_at {
            Some(started) => {
                (now - started).num_seconds() > i64::try_from(self.spec.timeout_seconds).unwrap_or(i64::MAX)
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
