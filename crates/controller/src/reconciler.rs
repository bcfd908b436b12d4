// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reconciler loop.
//!
//! Observes pipelines, their referenced templates and hardware, and owned
//! BMC jobs; each observed change enqueues the pipeline key. A pass is
//! pure observation followed by one conditional status write, so it can be
//! cancelled at any await without leaving persisted state inconsistent.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anvil_core::{BmcJob, BmcJobRole, Clock, Hardware, IdGen, Object, Pipeline, PipelineState, Workflow};
use anvil_store::{ObjectStore, StoreError, WatchEvent};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::advance::{advance, AdvanceContext, JobObservations};
use crate::bmc::BmcCoordinator;
use crate::queue::WorkQueue;

/// Delay before retrying when a referenced object is missing. Transient by
/// design: the reference may simply not have been submitted yet.
pub const MISSING_REFERENCE_RETRY: Duration = Duration::from_secs(5);

/// Delay before retrying a pass that failed on a store error.
const ERROR_RETRY: Duration = Duration::from_secs(5);

/// The store surface the reconciler needs.
pub trait ControlStore:
    ObjectStore<Pipeline>
    + ObjectStore<Workflow>
    + ObjectStore<Hardware>
    + ObjectStore<BmcJob>
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> ControlStore for T where
    T: ObjectStore<Pipeline>
        + ObjectStore<Workflow>
        + ObjectStore<Hardware>
        + ObjectStore<BmcJob>
        + Clone
        + Send
        + Sync
        + 'static
{
}

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    None,
    After(Duration),
}

pub struct Reconciler<S, C: Clock, G: IdGen> {
    store: S,
    bmc: BmcCoordinator<S>,
    clock: C,
    ids: G,
}

impl<S: ControlStore, C: Clock, G: IdGen> Reconciler<S, C, G> {
    pub fn new(store: S, clock: C, ids: G) -> Self {
        Self {
            bmc: BmcCoordinator::new(store.clone()),
            store,
            clock,
            ids,
        }
    }

    /// Reconcile one pipeline by key.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Requeue, StoreError> {
        let pipeline: Pipeline = match ObjectStore::<Pipeline>::get(&self.store, namespace, name).await
        {
            Ok(p) => p,
            Err(e) if e.is_not_found() => return Ok(Requeue::None),
            Err(e) => return Err(e),
        };

        // A terminal pipeline with a pending deletion has finished its
        // teardown; let the delete complete now.
        if pipeline.is_terminal() {
            if pipeline.metadata.deletion_requested() {
                ObjectStore::<Pipeline>::delete(&self.store, namespace, name).await?;
            }
            return Ok(Requeue::None);
        }

        let Some(entry) = pipeline.spec.workflows.first().cloned() else {
            return Ok(Requeue::None);
        };

        let template: Workflow =
            match ObjectStore::<Workflow>::get(&self.store, namespace, &entry.workflow_ref).await {
                Ok(t) => t,
                Err(e) if e.is_not_found() => {
                    debug!(
                        pipeline = name,
                        workflow = %entry.workflow_ref,
                        "template not found; requeue in 5 seconds"
                    );
                    return Ok(Requeue::After(MISSING_REFERENCE_RETRY));
                }
                Err(e) => return Err(e),
            };

        let hardware: Option<Hardware> = if entry.hardware_ref.is_empty() {
            None
        } else {
            match ObjectStore::<Hardware>::get(&self.store, namespace, &entry.hardware_ref).await {
                Ok(h) => Some(h),
                Err(e) if e.is_not_found() => {
                    debug!(
                        pipeline = name,
                        hardware = %entry.hardware_ref,
                        "hardware not found; requeue in 5 seconds"
                    );
                    return Ok(Requeue::After(MISSING_REFERENCE_RETRY));
                }
                Err(e) => return Err(e),
            }
        };

        let observations = match &hardware {
            Some(h) => self.bmc.observe(&pipeline, &h.metadata.name).await?,
            None => JobObservations::new(),
        };

        let ctx = AdvanceContext {
            template: Some(&template),
            hardware: hardware.as_ref(),
            jobs: &observations,
            now: self.clock.now(),
            ids: &self.ids,
        };
        let mut advanced = advance(&pipeline, &ctx);

        // Create whatever BMC jobs the new state calls for, then persist
        // status once.
        if let Some(h) = &hardware {
            self.ensure_jobs(&mut advanced, h).await?;
        }

        if advanced.status != pipeline.status {
            info!(
                pipeline = name,
                state = ?advanced.status.state,
                "pipeline state advanced"
            );
            match ObjectStore::<Pipeline>::update_status(&self.store, advanced.clone()).await {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {
                    // Someone else wrote first; observe their write and redo.
                    return Ok(Requeue::After(Duration::ZERO));
                }
                Err(e) => return Err(e),
            }
        }

        // Wake up again at the timeout deadline.
        if !advanced.is_terminal() && advanced.spec.timeout_seconds > 0 {
            if let Some(started) = advanced.status.started_at {
                let deadline =
                    started + chrono::Duration::seconds(advanced.spec.timeout_seconds as i64);
                let remaining = (deadline - self.clock.now()).num_seconds().max(1) as u64;
                return Ok(Requeue::After(Duration::from_secs(remaining)));
            }
        }

        Ok(Requeue::None)
    }

    async fn ensure_jobs(
        &self,
        pipeline: &mut Pipeline,
        hardware: &Hardware,
    ) -> Result<(), StoreError> {
        let Some(options) = pipeline.spec.boot_options_for(0).cloned() else {
            return Ok(());
        };

        match pipeline.status.state {
            Some(PipelineState::Preparing) => {
                if options.toggle_allow_netboot {
                    self.bmc
                        .ensure_job(pipeline, hardware, BmcJobRole::AllowPxe, None)
                        .await?;
                }
                if options.wants_iso_boot() {
                    let iso = options
                        .resolved_iso_url(hardware.spec.iso_url())
                        .map(str::to_string);
                    self.bmc
                        .ensure_job(pipeline, hardware, BmcJobRole::IsoBoot, iso.as_deref())
                        .await?;
                }
            }
            Some(PipelineState::Running) => {
                if options.toggle_allow_netboot && pipeline.status.all_actions_succeeded() {
                    self.bmc
                        .ensure_job(pipeline, hardware, BmcJobRole::DisallowPxe, None)
                        .await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Run the reconcile loop until `shutdown` is notified.
    ///
    /// Watches all four kinds, maps events to pipeline keys, and dispatches
    /// passes with at most one in flight per key; re-queues while a key is
    /// in flight coalesce into a single follow-up pass.
    pub async fn run(self: Arc<Self>, shutdown: Arc<Notify>) {
        let (queue, mut keys) = WorkQueue::new();

        self.clone().spawn_watchers(queue.clone());

        let (done_tx, mut done) = mpsc::unbounded_channel::<(String, Requeue)>();
        let mut in_flight: HashSet<String> = HashSet::new();
        let mut rerun: HashSet<String> = HashSet::new();

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("reconciler shutting down");
                    break;
                }
                Some(key) = keys.recv() => {
                    if in_flight.contains(&key) {
                        rerun.insert(key);
                        continue;
                    }
                    in_flight.insert(key.clone());
                    let reconciler = Arc::clone(&self);
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        let requeue = reconciler.reconcile_key(&key).await;
                        let _ = done_tx.send((key, requeue));
                    });
                }
                Some((key, requeue)) = done.recv() => {
                    in_flight.remove(&key);
                    if rerun.remove(&key) {
                        queue.enqueue(key);
                    } else {
                        match requeue {
                            Requeue::None => {}
                            Requeue::After(d) if d.is_zero() => queue.enqueue(key),
                            Requeue::After(d) => queue.enqueue_after(key, d),
                        }
                    }
                }
            }
        }
    }

    async fn reconcile_key(&self, key: &str) -> Requeue {
        let Some((namespace, name)) = key.split_once('/') else {
            warn!(key, "malformed reconcile key");
            return Requeue::None;
        };
        match self.reconcile(namespace, name).await {
            Ok(requeue) => requeue,
            Err(e) => {
                warn!(key, error = %e, "reconcile failed");
                Requeue::After(ERROR_RETRY)
            }
        }
    }

    fn spawn_watchers(self: Arc<Self>, queue: WorkQueue) {
        // Pipeline changes map straight to their own key.
        {
            let mut watch = ObjectStore::<Pipeline>::watch(&self.store);
            let queue = queue.clone();
            tokio::spawn(async move {
                loop {
                    match watch.recv().await {
                        Ok(event) => queue.enqueue(event.object().key()),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }

        // Template changes fan out to pipelines that reference them.
        {
            let mut watch = ObjectStore::<Workflow>::watch(&self.store);
            let queue = queue.clone();
            let reconciler = Arc::clone(&self);
            tokio::spawn(async move {
                loop {
                    match watch.recv().await {
                        Ok(event) => {
                            let wf = event.object();
                            reconciler
                                .enqueue_referencing(&queue, &wf.metadata.namespace, |entry| {
                                    entry.workflow_ref == wf.metadata.name
                                })
                                .await;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }

        // Hardware changes fan out the same way.
        {
            let mut watch = ObjectStore::<Hardware>::watch(&self.store);
            let queue = queue.clone();
            let reconciler = Arc::clone(&self);
            tokio::spawn(async move {
                loop {
                    match watch.recv().await {
                        Ok(event) => {
                            let hw = event.object();
                            reconciler
                                .enqueue_referencing(&queue, &hw.metadata.namespace, |entry| {
                                    entry.hardware_ref == hw.metadata.name
                                })
                                .await;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }

        // BMC job changes map back to the owning pipeline through the fixed
        // per-hardware job names.
        {
            let mut watch = ObjectStore::<BmcJob>::watch(&self.store);
            let reconciler = Arc::clone(&self);
            tokio::spawn(async move {
                loop {
                    match watch.recv().await {
                        Ok(event) => {
                            let job = event.object();
                            let job_name = job.metadata.name.clone();
                            reconciler
                                .enqueue_referencing(&queue, &job.metadata.namespace, |entry| {
                                    !entry.hardware_ref.is_empty()
                                        && [
                                            BmcJobRole::AllowPxe,
                                            BmcJobRole::IsoBoot,
                                            BmcJobRole::DisallowPxe,
                                        ]
                                        .iter()
                                        .any(|r| r.job_name(&entry.hardware_ref) == job_name)
                                })
                                .await;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }
    }

    async fn enqueue_referencing<F>(&self, queue: &WorkQueue, namespace: &str, matches: F)
    where
        F: Fn(&anvil_core::PipelineWorkflow) -> bool,
    {
        let pipelines: Vec<Pipeline> =
            match ObjectStore::<Pipeline>::list(&self.store, namespace).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(namespace, error = %e, "failed to list pipelines for watch fan-out");
                    return;
                }
            };
        for pipeline in pipelines {
            if pipeline.spec.workflows.iter().any(&matches) {
                queue.enqueue(pipeline.key());
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
