// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn merge_binds_keeps_scratch_and_appends() {
    let binds = merge_binds(
        "/var/lib/anvil/deploy:/workflow".to_string(),
        &["/etc/data:/data:ro".to_string()],
    );
    assert_eq!(
        binds,
        ["/var/lib/anvil/deploy:/workflow", "/etc/data:/data:ro"]
    );
}

#[test]
fn later_bind_wins_on_target_conflict() {
    let binds = merge_binds(
        "/var/lib/anvil/deploy:/workflow".to_string(),
        &[
            "/mnt/a:/data".to_string(),
            "/mnt/b:/data:rw".to_string(),
        ],
    );
    assert_eq!(binds, ["/var/lib/anvil/deploy:/workflow", "/mnt/b:/data:rw"]);
}

#[test]
fn action_bind_may_override_the_scratch_mount() {
    let binds = merge_binds(
        "/var/lib/anvil/deploy:/workflow".to_string(),
        &["/mnt/shared:/workflow".to_string()],
    );
    assert_eq!(binds, ["/mnt/shared:/workflow"]);
}

#[parameterized(
    with_options = { "/etc/data:/data:ro", "/data" },
    without_options = { "volname:/data", "/data" },
    bare = { "/just-a-path", "/just-a-path" },
)]
fn bind_target_extraction(bind: &str, expected: &str) {
    assert_eq!(bind_target(bind), expected);
}
