// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    allow = { BmcJobRole::AllowPxe, "netboot-allow-machine1" },
    disallow = { BmcJobRole::DisallowPxe, "netboot-disallow-machine1" },
    iso = { BmcJobRole::IsoBoot, "iso-boot-machine1" },
)]
fn job_names_are_deterministic_per_hardware(role: BmcJobRole, expected: &str) {
    assert_eq!(role.job_name("machine1"), expected);
    assert_eq!(role.job_name("machine1"), role.job_name("machine1"));
}

#[test]
fn allow_pxe_tasks() {
    assert_eq!(
        BmcJobRole::AllowPxe.tasks(None),
        vec![BmcTask::SetPxe { enabled: true }]
    );
    assert_eq!(
        BmcJobRole::DisallowPxe.tasks(None),
        vec![BmcTask::SetPxe { enabled: false }]
    );
}

#[test]
fn iso_boot_tasks_carry_media_and_power_cycle() {
    let tasks = BmcJobRole::IsoBoot.tasks(Some("http://images/osie.iso"));
    assert_eq!(
        tasks,
        vec![
            BmcTask::SetBootDevice {
                device: BootDevice::Cdrom,
                one_shot: true,
                media_url: Some("http://images/osie.iso".to_string()),
            },
            BmcTask::PowerCycle,
        ]
    );
}

#[test]
fn task_serialization_is_tagged() {
    let task = BmcTask::SetPxe { enabled: true };
    let json = serde_json::to_string(&task).unwrap();
    assert_eq!(json, r#"{"task":"setPxe","enabled":true}"#);

    let parsed: BmcTask = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, task);
}
