// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

fn hardware_with_interface(mac: &str, ipam: Option<Ipam>) -> HardwareSpec {
    let mut spec = HardwareSpec::default();
    spec.network_interfaces.insert(
        mac.to_string(),
        NetworkInterface {
            ipam,
            ..NetworkInterface::default()
        },
    );
    spec
}

fn ipv4_ipam(ip: &str, netmask: &str) -> Ipam {
    Ipam {
        ip: ip.to_string(),
        netmask: Some(netmask.to_string()),
        ..Ipam::default()
    }
}

#[test]
fn valid_ipv4_interface_accepted() {
    let spec = hardware_with_interface("00:1a:2b:3c:4d:5e", Some(ipv4_ipam("10.0.0.7", "255.255.255.0")));
    assert!(spec.validate().is_ok());
}

#[parameterized(
    uppercase = { "00:1A:2B:3C:4D:5E" },
    dashes = { "00-1a-2b-3c-4d-5e" },
    short = { "00:1a:2b:3c:4d" },
    bare = { "001a2b3c4d5e" },
)]
fn non_canonical_mac_rejected(mac: &str) {
    let spec = hardware_with_interface(mac, None);
    assert!(matches!(
        spec.validate(),
        Err(ValidationError::InvalidMac { .. })
    ));
}

#[test]
fn ipv4_without_netmask_rejected() {
    let ipam = Ipam {
        ip: "10.0.0.7".to_string(),
        ..Ipam::default()
    };
    let spec = hardware_with_interface("00:1a:2b:3c:4d:5e", Some(ipam));
    assert!(matches!(
        spec.validate(),
        Err(ValidationError::InvalidIpam { .. })
    ));
}

#[test]
fn ipv6_requires_prefix_not_netmask() {
    let ipam = Ipam {
        ip_type: IpType::IPv6,
        ip: "fd00::7".to_string(),
        prefix: Some(64),
        ..Ipam::default()
    };
    let spec = hardware_with_interface("00:1a:2b:3c:4d:5e", Some(ipam));
    assert!(spec.validate().is_ok());
}

#[test]
fn ipv6_prefix_out_of_range_rejected() {
    let ipam = Ipam {
        ip_type: IpType::IPv6,
        ip: "fd00::7".to_string(),
        prefix: Some(129),
        ..Ipam::default()
    };
    let spec = hardware_with_interface("00:1a:2b:3c:4d:5e", Some(ipam));
    assert!(spec.validate().is_err());
}

#[test]
fn ip_family_must_match_declared_type() {
    let ipam = Ipam {
        ip_type: IpType::IPv4,
        ip: "fd00::7".to_string(),
        netmask: Some("255.255.255.0".to_string()),
        ..Ipam::default()
    };
    let spec = hardware_with_interface("00:1a:2b:3c:4d:5e", Some(ipam));
    assert!(spec.validate().is_err());
}

#[test]
fn vlan_id_upper_bound_enforced() {
    let mut ipam = ipv4_ipam("10.0.0.7", "255.255.255.0");
    ipam.vlan_id = Some(4097);
    let spec = hardware_with_interface("00:1a:2b:3c:4d:5e", Some(ipam));
    assert!(spec.validate().is_err());
}

#[parameterized(
    sda = { "/dev/sda" },
    nvme_disk = { "/dev/nvme0n1" },
    by_path = { "/dev/disk/by-id/wwn-0x5000c500a1b2c3d4" },
)]
fn whole_disk_paths_accepted(path: &str) {
    let spec = HardwareSpec {
        storage_devices: vec![path.to_string()],
        ..HardwareSpec::default()
    };
    assert!(spec.validate().is_ok());
}

#[parameterized(
    sda_partition = { "/dev/sda1" },
    nvme_partition = { "/dev/nvme0n1p1" },
    relative = { "dev/sda" },
    backslashes = { r"\dev\sda" },
    spaces = { "/dev/s da" },
)]
fn bad_storage_paths_rejected(path: &str) {
    let spec = HardwareSpec {
        storage_devices: vec![path.to_string()],
        ..HardwareSpec::default()
    };
    assert!(matches!(
        spec.validate(),
        Err(ValidationError::InvalidStorageDevice { .. })
    ));
}

#[test]
fn osie_for_mac_prefers_interface_override() {
    let default_osie = Osie {
        kernel_url: Some("http://boot/kernel".to_string()),
        ..Osie::default()
    };
    let override_osie = Osie {
        kernel_url: Some("http://boot/other-kernel".to_string()),
        ..Osie::default()
    };

    let mut spec = HardwareSpec {
        osie: Some(default_osie),
        ..HardwareSpec::default()
    };
    spec.network_interfaces.insert(
        "00:00:00:00:00:01".to_string(),
        NetworkInterface {
            osie: Some(override_osie),
            ..NetworkInterface::default()
        },
    );
    spec.network_interfaces.insert(
        "00:00:00:00:00:02".to_string(),
        NetworkInterface::default(),
    );

    let first = spec.osie_for_mac("00:00:00:00:00:01").unwrap();
    assert_eq!(first.kernel_url.as_deref(), Some("http://boot/other-kernel"));
    let second = spec.osie_for_mac("00:00:00:00:00:02").unwrap();
    assert_eq!(second.kernel_url.as_deref(), Some("http://boot/kernel"));
}

#[test]
fn disable_dhcp_implies_netboot_disabled() {
    let ni = NetworkInterface {
        disable_dhcp: true,
        ..NetworkInterface::default()
    };
    assert!(!ni.is_dhcp_enabled());
    assert!(!ni.is_netboot_enabled());
}

#[test]
fn macs_and_ips_enumerate_interfaces() {
    let mut spec = HardwareSpec::default();
    spec.network_interfaces.insert(
        "00:00:00:00:00:01".to_string(),
        NetworkInterface {
            ipam: Some(ipv4_ipam("10.0.0.1", "255.255.255.0")),
            ..NetworkInterface::default()
        },
    );
    spec.network_interfaces.insert(
        "00:00:00:00:00:02".to_string(),
        NetworkInterface::default(),
    );
    assert_eq!(spec.macs().len(), 2);
    assert_eq!(spec.ips(), vec!["10.0.0.1"]);
}

proptest! {
    #[test]
    fn generated_canonical_macs_validate(bytes in proptest::array::uniform6(0u8..)) {
        let mac = bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":");
        let spec = hardware_with_interface(&mac, None);
        prop_assert!(spec.validate().is_ok());
    }
}
