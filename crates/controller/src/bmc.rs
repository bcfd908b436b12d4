// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! BMC job coordinator.
//!
//! Owns the create-or-replace rule: a job for a given role on a given
//! hardware always uses the same name, so at most one exists at a time and
//! nothing is orphaned across runs. Completion and failure are observed
//! from the job objects; failed jobs are never retried here.

use anvil_core::{BmcJob, BmcJobRole, BmcJobSpec, Hardware, JobStatus, ObjectMeta, Pipeline};
use anvil_store::{ObjectStore, StoreError};
use tracing::info;

use crate::advance::JobObservations;

pub struct BmcCoordinator<S> {
    store: S,
}

impl<S: ObjectStore<BmcJob>> BmcCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create the job for `role` if this pipeline has not already done so,
    /// replacing any conflicting object with the fixed name. Records the
    /// created UID (and whether an existing job was deleted) in the
    /// pipeline's status slot.
    pub async fn ensure_job(
        &self,
        pipeline: &mut Pipeline,
        hardware: &Hardware,
        role: BmcJobRole,
        iso_url: Option<&str>,
    ) -> Result<(), StoreError> {
        if pipeline
            .status
            .boot_options
            .jobs
            .contains_key(role.as_str())
        {
            return Ok(());
        }

        let namespace = pipeline.metadata.namespace.clone();
        let name = role.job_name(&hardware.metadata.name);
        let job = BmcJob {
            metadata: ObjectMeta::named(namespace.clone(), name.clone()),
            spec: BmcJobSpec {
                machine_ref: hardware.spec.bmc_ref.clone().unwrap_or_default(),
                tasks: role.tasks(iso_url),
            },
            ..BmcJob::default()
        };

        let mut existing_job_deleted = false;
        let created = match self.store.create(job.clone()).await {
            Ok(created) => created,
            Err(StoreError::AlreadyExists { .. }) => {
                self.store.delete(&namespace, &name).await?;
                existing_job_deleted = true;
                self.store.create(job).await?
            }
            Err(e) => return Err(e),
        };

        info!(
            pipeline = %pipeline.metadata.name,
            job = %name,
            role = %role,
            existing_job_deleted,
            "created bmc job"
        );

        pipeline.status.boot_options.jobs.insert(
            role.as_str().to_string(),
            JobStatus {
                uid: created.metadata.uid,
                complete: false,
                existing_job_deleted,
            },
        );
        Ok(())
    }

    /// Fetch the current job objects for every role this pipeline has a
    /// status slot for. Missing objects are simply absent from the result.
    pub async fn observe(
        &self,
        pipeline: &Pipeline,
        hardware_name: &str,
    ) -> Result<JobObservations, StoreError> {
        let mut observations = JobObservations::new();
        for role in [
            BmcJobRole::AllowPxe,
            BmcJobRole::IsoBoot,
            BmcJobRole::DisallowPxe,
        ] {
            if !pipeline
                .status
                .boot_options
                .jobs
                .contains_key(role.as_str())
            {
                continue;
            }
            let name = role.job_name(hardware_name);
            match self.store.get(&pipeline.metadata.namespace, &name).await {
                Ok(job) => observations.insert(role, job),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(observations)
    }
}

#[cfg(test)]
#[path = "bmc_tests.rs"]
mod tests;
