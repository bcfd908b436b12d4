// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-pipeline state machine.
//!
//! [`advance`] is a pure function of the observed pipeline plus the latest
//! template, hardware, and BMC job observations. It never talks to the
//! store; the reconciler persists whatever it returns with one conditional
//! status write.

use anvil_core::{
    ActionStatus, BmcJob, BmcJobRole, BootOptions, Condition, ConditionStatus, ConditionType,
    Hardware, HardwareSpec, IdGen, Pipeline, PipelineState, Workflow, WorkflowRenderingState,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Owned BMC jobs observed for the pipeline's hardware, keyed by role.
#[derive(Debug, Default)]
pub struct JobObservations {
    jobs: HashMap<BmcJobRole, BmcJob>,
}

impl JobObservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: BmcJobRole, job: BmcJob) {
        self.jobs.insert(role, job);
    }

    pub fn get(&self, role: BmcJobRole) -> Option<&BmcJob> {
        self.jobs.get(&role)
    }
}

/// Everything [`advance`] may look at besides the pipeline itself.
pub struct AdvanceContext<'a, G: IdGen> {
    /// The referenced workflow template, when resolved.
    pub template: Option<&'a Workflow>,

    /// The referenced hardware, when the pipeline names one.
    pub hardware: Option<&'a Hardware>,

    /// Observed owned BMC jobs.
    pub jobs: &'a JobObservations,

    /// The authoritative control-plane time for this pass.
    pub now: DateTime<Utc>,

    /// Generator for action status IDs.
    pub ids: &'a G,
}

/// Compute the pipeline's next status. Idempotent: advancing an
/// already-advanced pipeline with identical inputs returns it unchanged.
pub fn advance<G: IdGen>(pipeline: &Pipeline, ctx: &AdvanceContext<'_, G>) -> Pipeline {
    let mut p = pipeline.clone();
    if p.is_terminal() {
        return p;
    }

    // A deletion request cancels the pipeline. Before an agent has engaged
    // there is nothing to abort, so cancellation completes immediately;
    // afterwards the agent's next report confirms the abort.
    if p.metadata.deletion_requested() {
        match p.status.state {
            None | Some(PipelineState::Preparing) | Some(PipelineState::Pending) => {
                p.status.transition(PipelineState::Canceled, ctx.now);
            }
            Some(PipelineState::Cancelling) => {}
            Some(_) => p.status.transition(PipelineState::Cancelling, ctx.now),
        }
        return p;
    }

    if p.status.actions.is_empty() {
        render_and_populate(&mut p, ctx);
        return p;
    }

    // Pipeline timeout overrides whatever the actions are doing.
    if p.timed_out(ctx.now) {
        p.status.failure_reason = "PipelineTimeout".to_string();
        p.status.failure_message = format!(
            "pipeline exceeded its {}s timeout",
            p.spec.timeout_seconds
        );
        p.status.transition(PipelineState::Failed, ctx.now);
        return p;
    }

    observe_jobs(&mut p, ctx);
    if p.is_terminal() {
        return p;
    }

    match p.status.state {
        Some(PipelineState::Preparing) => {
            if prepare_complete(&p) {
                p.status.transition(PipelineState::Pending, ctx.now);
            }
        }
        Some(PipelineState::Running) => {
            if p.status.any_action_failed() {
                if let Some(failed) = p
                    .status
                    .actions
                    .iter()
                    .find(|a| a.state == anvil_core::ActionState::Failed)
                {
                    p.status.failure_reason = if failed.failure_reason.is_empty() {
                        "ActionFailed".to_string()
                    } else {
                        failed.failure_reason.clone()
                    };
                    p.status.failure_message = failed.failure_message.clone();
                }
                p.status.transition(PipelineState::Failed, ctx.now);
            } else if p.status.all_actions_succeeded() && teardown_complete(&p) {
                p.status.transition(PipelineState::Succeeded, ctx.now);
            }
        }
        _ => {}
    }

    p
}

fn effective_boot_options(p: &Pipeline) -> Option<&BootOptions> {
    p.spec.boot_options_for(0)
}

fn render_and_populate<G: IdGen>(p: &mut Pipeline, ctx: &AdvanceContext<'_, G>) {
    let Some(entry) = p.spec.workflows.first().cloned() else {
        return;
    };
    let Some(template) = ctx.template else {
        // Unresolved reference; the reconciler requeues rather than failing.
        return;
    };

    let default_spec = HardwareSpec::default();
    let hardware_spec = ctx.hardware.map(|h| &h.spec).unwrap_or(&default_spec);
    let params = p.spec.params_for(0);

    match anvil_render::render(&template.spec, hardware_spec, &params) {
        Ok(rendered) => {
            p.status.actions = rendered
                .actions
                .iter()
                .map(|action| {
                    // Workflow-level env and volumes apply to every action.
                    // The action's own entries come later and win on
                    // conflict when binds are resolved.
                    let mut merged = action.clone();
                    let mut env = rendered.env.clone();
                    for (k, v) in &action.env {
                        env.insert(k.clone(), v.clone());
                    }
                    merged.env = env;
                    let mut volumes = rendered.volumes.clone();
                    volumes.extend(action.volumes.iter().cloned());
                    merged.volumes = volumes;

                    ActionStatus {
                        id: ctx.ids.next(),
                        workflow_id: entry.workflow_ref.clone(),
                        agent_id: entry.agent_id.clone(),
                        rendered: merged,
                        ..ActionStatus::default()
                    }
                })
                .collect();
            p.status.current_workflow = entry.workflow_ref.clone();
            p.status.current_action = rendered
                .actions
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default();
            p.status.current_hardware = entry.hardware_ref.clone();
            p.status.current_agent = entry.agent_id.clone();
            p.status.workflow_rendering = WorkflowRenderingState::Succeeded;
            p.status.conditions.set(Condition {
                condition_type: ConditionType::WorkflowRenderedSuccess,
                status: ConditionStatus::True,
                reason: String::new(),
                message: String::new(),
                time: Some(ctx.now),
            });
            p.status.transition(PipelineState::Preparing, ctx.now);
        }
        Err(err) => {
            p.status.workflow_rendering = WorkflowRenderingState::Failed;
            p.status.conditions.set(Condition {
                condition_type: ConditionType::WorkflowRenderedSuccess,
                status: ConditionStatus::False,
                reason: "RenderFailed".to_string(),
                message: err.to_string(),
                time: Some(ctx.now),
            });
            p.status.failure_reason = "RenderFailed".to_string();
            p.status.failure_message = err.to_string();
            p.status.transition(PipelineState::Failed, ctx.now);
        }
    }
}

/// Fold observed job state into the pipeline's per-role slots and the
/// netboot toggle bookkeeping. A failed job fails the pipeline; the
/// coordinator never retries it.
fn observe_jobs<G: IdGen>(p: &mut Pipeline, ctx: &AdvanceContext<'_, G>) {
    for role in [
        BmcJobRole::AllowPxe,
        BmcJobRole::IsoBoot,
        BmcJobRole::DisallowPxe,
    ] {
        let Some(slot) = p.status.boot_options.jobs.get(role.as_str()).cloned() else {
            continue;
        };
        let Some(job) = ctx.jobs.get(role) else {
            continue;
        };
        // The fixed name may be reused by a later pipeline; only the UID we
        // created counts.
        if job.metadata.uid != slot.uid {
            continue;
        }

        if job.status.failed {
            p.status.conditions.set(Condition {
                condition_type: ConditionType::NetbootJobFailed,
                status: ConditionStatus::True,
                reason: role.to_string(),
                message: job.status.message.clone(),
                time: Some(ctx.now),
            });
            p.status.failure_reason = "NetbootJobFailed".to_string();
            p.status.failure_message = job.status.message.clone();
            p.status.transition(PipelineState::Failed, ctx.now);
            return;
        }

        if job.status.complete && !slot.complete {
            if let Some(slot) = p.status.boot_options.jobs.get_mut(role.as_str()) {
                slot.complete = true;
            }
            match role {
                BmcJobRole::AllowPxe => {
                    p.status.boot_options.allow_netboot.toggled_true = true;
                    p.status.conditions.set(Condition {
                        condition_type: ConditionType::AllowNetbootTrue,
                        status: ConditionStatus::True,
                        reason: String::new(),
                        message: String::new(),
                        time: Some(ctx.now),
                    });
                }
                BmcJobRole::DisallowPxe => {
                    p.status.boot_options.allow_netboot.toggled_false = true;
                    p.status.conditions.set(Condition {
                        condition_type: ConditionType::AllowNetbootFalse,
                        status: ConditionStatus::True,
                        reason: String::new(),
                        message: String::new(),
                        time: Some(ctx.now),
                    });
                }
                BmcJobRole::IsoBoot => {}
            }
            p.status.conditions.set(Condition {
                condition_type: ConditionType::NetbootJobComplete,
                status: ConditionStatus::True,
                reason: role.to_string(),
                message: String::new(),
                time: Some(ctx.now),
            });
        } else if !job.status.complete {
            p.status.conditions.set(Condition {
                condition_type: ConditionType::NetbootJobRunning,
                status: ConditionStatus::True,
                reason: role.to_string(),
                message: String::new(),
                time: Some(ctx.now),
            });
        }
    }
}

/// All BMC prerequisites for leaving Preparing are complete.
fn prepare_complete(p: &Pipeline) -> bool {
    let Some(options) = effective_boot_options(p) else {
        return true;
    };
    if !options.requires_bmc() {
        return true;
    }

    let slot_complete = |role: BmcJobRole| {
        p.status
            .boot_options
            .jobs
            .get(role.as_str())
            .is_some_and(|slot| slot.complete)
    };

    if options.toggle_allow_netboot && !slot_complete(BmcJobRole::AllowPxe) {
        return false;
    }
    if options.wants_iso_boot() && !slot_complete(BmcJobRole::IsoBoot) {
        return false;
    }
    true
}

/// The post-success netboot teardown, when owed, has been applied.
fn teardown_complete(p: &Pipeline) -> bool {
    match effective_boot_options(p) {
        Some(options) if options.toggle_allow_netboot => {
            p.status.boot_options.allow_netboot.toggled_false
        }
        _ => true,
    }
}

#[cfg(test)]
#[path = "advance_tests.rs"]
mod tests;
