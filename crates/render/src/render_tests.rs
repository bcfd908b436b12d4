// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use anvil_core::{Action, Ipam, NetworkInterface};

fn template_with_cmd(cmd: &str) -> WorkflowSpec {
    WorkflowSpec {
        actions: vec![Action {
            name: "install".to_string(),
            image: "quay.io/example/install:v1".to_string(),
            cmd: Some(cmd.to_string()),
            ..Action::default()
        }],
        ..WorkflowSpec::default()
    }
}

fn hardware_with_ip(mac: &str, ip: &str) -> HardwareSpec {
    let mut spec = HardwareSpec::default();
    spec.network_interfaces.insert(
        mac.to_string(),
        NetworkInterface {
            ipam: Some(Ipam {
                ip: ip.to_string(),
                netmask: Some("255.255.255.0".to_string()),
                ..Ipam::default()
            }),
            ..NetworkInterface::default()
        },
    );
    spec
}

fn params(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn substitutes_params() {
    let template = template_with_cmd("{{ Param.Foo }}");
    let rendered = render(&template, &HardwareSpec::default(), &params(&[("Foo", "Bar")])).unwrap();
    assert_eq!(rendered.actions[0].cmd.as_deref(), Some("Bar"));
}

#[test]
fn substitutes_hardware_fields() {
    let template = template_with_cmd(
        "write-ip --ip {{ Hardware.networkInterfaces[\"00:1a:2b:3c:4d:5e\"].ipam.ip }}",
    );
    let hardware = hardware_with_ip("00:1a:2b:3c:4d:5e", "10.0.0.7");
    let rendered = render(&template, &hardware, &IndexMap::new()).unwrap();
    assert_eq!(
        rendered.actions[0].cmd.as_deref(),
        Some("write-ip --ip 10.0.0.7")
    );
}

#[test]
fn missing_key_fails_the_render() {
    let template = template_with_cmd("{{ Param.Missing }}");
    let err = render(&template, &HardwareSpec::default(), &IndexMap::new()).unwrap_err();
    assert!(matches!(err, RenderError::Execute(_)), "got {:?}", err);
    assert!(
        err.to_string().to_lowercase().contains("undefined"),
        "got {}",
        err
    );
}

#[test]
fn malformed_template_is_parse_error() {
    let template = template_with_cmd("{{ Param.Foo");
    let err = render(&template, &HardwareSpec::default(), &params(&[("Foo", "x")])).unwrap_err();
    assert!(matches!(err, RenderError::Parse(_)), "got {:?}", err);
}

#[test]
fn rendered_yaml_that_breaks_structure_is_unmarshal_error() {
    // The marshalled template single-quotes the cmd scalar; a substituted
    // value carrying a single quote corrupts the YAML.
    let template = template_with_cmd("{{ Param.Foo }}");
    let err = render(
        &template,
        &HardwareSpec::default(),
        &params(&[("Foo", "O'Brien")]),
    )
    .unwrap_err();
    assert!(matches!(err, RenderError::Unmarshal(_)), "got {:?}", err);
}

#[test]
fn helper_functions_compose() {
    let template = template_with_cmd("{{ formatMAC(uppercase(Param.mac)) }}");
    let rendered = render(
        &template,
        &HardwareSpec::default(),
        &params(&[("mac", "00-1a-2b-3c-4d-5e")]),
    )
    .unwrap();
    assert_eq!(rendered.actions[0].cmd.as_deref(), Some("00:1a:2b:3c:4d:5e"));
}

#[test]
fn render_is_deterministic() {
    let mut template = template_with_cmd("{{ Param.Foo }} on {{ formatIP(Param.ip) }}");
    template.env.insert("B".to_string(), "2".to_string());
    template.env.insert("A".to_string(), "1".to_string());
    let hardware = hardware_with_ip("00:1a:2b:3c:4d:5e", "10.0.0.7");
    let p = params(&[("Foo", "Bar"), ("ip", "10.0.0.9")]);

    let first = rendered_yaml(&template, &hardware, &p).unwrap();
    let second = rendered_yaml(&template, &hardware, &p).unwrap();
    assert_eq!(first, second);
}

#[test]
fn env_values_may_be_templated() {
    let mut template = template_with_cmd("install");
    template.actions[0]
        .env
        .insert("TARGET_DISK".to_string(), "{{ Param.disk }}".to_string());
    let rendered = render(
        &template,
        &HardwareSpec::default(),
        &params(&[("disk", "/dev/sda")]),
    )
    .unwrap();
    assert_eq!(
        rendered.actions[0].env.get("TARGET_DISK").map(String::as_str),
        Some("/dev/sda")
    );
}

#[test]
fn templated_action_name_rejected() {
    let mut template = template_with_cmd("install");
    template.actions[0].name = "{{ Param.name }}".to_string();
    let err = render(
        &template,
        &HardwareSpec::default(),
        &params(&[("name", "sneaky")]),
    )
    .unwrap_err();
    assert!(
        matches!(err, RenderError::ActionNameNotLiteral { .. }),
        "got {:?}",
        err
    );
}
