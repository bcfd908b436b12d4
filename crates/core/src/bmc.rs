// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! BMC job objects: out-of-band requests against a machine's baseboard
//! management controller. The controller that executes them is external;
//! this side owns only the request objects and observes their completion.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::meta::{Object, ObjectMeta};

/// A request for the BMC controller to act on a machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmcJob {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: BmcJobSpec,

    #[serde(default)]
    pub status: BmcJobStatus,
}

impl Object for BmcJob {
    const KIND: &'static str = "BmcJob";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmcJobSpec {
    /// Name of the BMC machine object to act on.
    pub machine_ref: String,

    /// Tasks executed in order by the BMC controller.
    #[serde(default)]
    pub tasks: Vec<BmcTask>,
}

/// One task of a BMC job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "camelCase")]
pub enum BmcTask {
    /// Set the machine's PXE allowance.
    SetPxe { enabled: bool },
    /// Set the next boot device, optionally for one boot only. For CDROM
    /// boots, `media_url` names the ISO to mount as virtual media.
    SetBootDevice {
        device: BootDevice,
        one_shot: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_url: Option<String>,
    },
    /// Power-cycle the machine.
    PowerCycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootDevice {
    Pxe,
    Cdrom,
    Disk,
}

/// Black-box status reported by the BMC controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmcJobStatus {
    /// All tasks completed.
    #[serde(default)]
    pub complete: bool,

    /// A task failed; the job will not make further progress.
    #[serde(default)]
    pub failed: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// The roles a pipeline creates BMC jobs for. Each role has exactly one
/// deterministic job name per hardware, so at most one job object per role
/// can exist per machine at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BmcJobRole {
    /// Enable PXE before provisioning.
    AllowPxe,
    /// Disable PXE after all actions succeed.
    DisallowPxe,
    /// One-shot boot of an ISO from virtual CDROM.
    IsoBoot,
}

impl BmcJobRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BmcJobRole::AllowPxe => "netboot-allow",
            BmcJobRole::DisallowPxe => "netboot-disallow",
            BmcJobRole::IsoBoot => "iso-boot",
        }
    }

    /// Fixed job name for this role on the given hardware. Reusing the same
    /// name gives exactly-one-active-job-per-role semantics and avoids
    /// orphaning a job per run.
    pub fn job_name(&self, hardware_name: &str) -> String {
        format!("{}-{}", self.as_str(), hardware_name)
    }

    /// The task list this role submits.
    pub fn tasks(&self, iso_url: Option<&str>) -> Vec<BmcTask> {
        match self {
            BmcJobRole::AllowPxe => vec![BmcTask::SetPxe { enabled: true }],
            BmcJobRole::DisallowPxe => vec![BmcTask::SetPxe { enabled: false }],
            BmcJobRole::IsoBoot => vec![
                BmcTask::SetBootDevice {
                    device: BootDevice::Cdrom,
                    one_shot: true,
                    media_url: iso_url.map(str::to_string),
                },
                BmcTask::PowerCycle,
            ],
        }
    }
}

impl fmt::Display for BmcJobRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[path = "bmc_tests.rs"]
mod tests;
