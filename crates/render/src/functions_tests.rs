// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    colons = { "00:1A:2B:3C:4D:5E" },
    dashes = { "00-1a-2b-3c-4d-5e" },
    dots = { "001a.2b3c.4d5e" },
    bare = { "001A2B3C4D5E" },
)]
fn format_mac_canonicalises(input: &str) {
    assert_eq!(format_mac(input).unwrap(), "00:1a:2b:3c:4d:5e");
}

#[parameterized(
    short = { "00:1a:2b" },
    non_hex = { "00:1a:2b:3c:4d:5g" },
    empty = { "" },
)]
fn format_mac_rejects_malformed(input: &str) {
    assert!(format_mac(input).is_err());
}

#[test]
fn format_ip_parses_both_families() {
    assert_eq!(format_ip("10.0.0.7").unwrap(), "10.0.0.7");
    assert_eq!(format_ip("fd00::0007").unwrap(), "fd00::7");
    assert_eq!(format_ip("10.0.0.7/24").unwrap(), "10.0.0.7");
    assert!(format_ip("not-an-ip").is_err());
}

#[test]
fn string_helpers() {
    assert_eq!(lowercase("AbC"), "abc");
    assert_eq!(uppercase("AbC"), "ABC");
    assert!(contains("abcdef", "cde"));
    assert!(has_prefix("quay.io/example", "quay.io"));
    assert!(has_suffix("disk.iso", ".iso"));
}

#[test]
fn contains_key_on_maps() {
    let entries = indexmap::indexmap! {
        "zone".to_string() => "us-east".to_string(),
    };
    let map = Value::from_serialize(&entries);
    assert!(contains_key(map.clone(), "zone"));
    assert!(!contains_key(map, "region"));
}
