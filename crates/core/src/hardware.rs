// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hardware: declarative identity for a physical machine.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::meta::{Object, ObjectMeta};
use crate::validation::{
    ValidationError, DEVICE_PATH_PATTERN, MAC_PATTERN, PARTITION_PATTERN,
};

/// A machine that pipelines can execute against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hardware {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: HardwareSpec,
}

impl Object for Hardware {
    const KIND: &'static str = "Hardware";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.spec.validate()
    }
}

/// Map of canonical MAC address to interface configuration.
pub type NetworkInterfaces = IndexMap<String, NetworkInterface>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSpec {
    /// Desired DHCP and netboot configuration per interface, keyed by MAC.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub network_interfaces: NetworkInterfaces,

    /// Default installation environment for all interfaces, unless an
    /// interface carries its own override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osie: Option<Osie>,

    /// Instance-specific data, opaque to the orchestrator core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<Instance>,

    /// Storage device paths that exist in the hardware. Whole disks, not
    /// partitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage_devices: Vec<String>,

    /// Name of the BMC machine object for out-of-band control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmc_ref: Option<String>,
}

impl HardwareSpec {
    /// All MAC addresses declared on this hardware.
    pub fn macs(&self) -> Vec<&str> {
        self.network_interfaces.keys().map(String::as_str).collect()
    }

    /// All configured IP addresses. Does not consider the DisableDHCP flag.
    pub fn ips(&self) -> Vec<&str> {
        self.network_interfaces
            .values()
            .filter_map(|ni| ni.ipam.as_ref())
            .map(|ipam| ipam.ip.as_str())
            .collect()
    }

    /// Installation environment for an interface: the per-interface override
    /// when present, the hardware-level default otherwise.
    pub fn osie_for_mac(&self, mac: &str) -> Option<&Osie> {
        self.network_interfaces
            .get(mac)
            .and_then(|ni| ni.osie.as_ref())
            .or(self.osie.as_ref())
    }

    /// ISO URL from the hardware-level installation environment, if any.
    pub fn iso_url(&self) -> Option<&str> {
        self.osie
            .as_ref()
            .and_then(|osie| osie.iso_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (mac, interface) in &self.network_interfaces {
            if !MAC_PATTERN.is_match(mac) {
                return Err(ValidationError::InvalidMac { mac: mac.clone() });
            }
            if let Some(ipam) = &interface.ipam {
                ipam.validate(mac)?;
            }
        }
        for path in &self.storage_devices {
            validate_storage_device(path)?;
        }
        Ok(())
    }
}

/// Desired configuration for one network interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    /// DHCP reservation data. Required when DHCP is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipam: Option<Ipam>,

    /// Disables DHCP for this interface. Implies DisableNetboot.
    #[serde(default)]
    pub disable_dhcp: bool,

    /// Disables network booting for this interface.
    #[serde(default)]
    pub disable_netboot: bool,

    /// Overrides the hardware-level installation environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osie: Option<Osie>,
}

impl NetworkInterface {
    pub fn is_dhcp_enabled(&self) -> bool {
        !self.disable_dhcp
    }

    pub fn is_netboot_enabled(&self) -> bool {
        !self.disable_netboot && !self.disable_dhcp
    }
}

/// Address family of an IPAM reservation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpType {
    #[default]
    IPv4,
    IPv6,
}

/// Basic IP address management data; effectively a DHCP reservation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ipam {
    #[serde(default)]
    pub ip_type: IpType,

    pub ip: String,

    /// IPv4 netmask. Required when `ip_type` is IPv4, ignored otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,

    /// IPv6 prefix length. Required when `ip_type` is IPv6, ignored otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// VLAN ID between 0 and 4096.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeservers: Vec<String>,

    /// Lease duration to serve. 24h default, max u32 per RFC 2132 §9.2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_time_seconds: Option<u64>,
}

impl Ipam {
    fn validate(&self, mac: &str) -> Result<(), ValidationError> {
        let invalid = |message: String| ValidationError::InvalidIpam {
            mac: mac.to_string(),
            message,
        };

        match self.ip_type {
            IpType::IPv4 => {
                if self.ip.parse::<std::net::Ipv4Addr>().is_err() {
                    return Err(invalid(format!("{:?} is not an IPv4 address", self.ip)));
                }
                let netmask = self
                    .netmask
                    .as_deref()
                    .ok_or_else(|| invalid("netmask is required for IPv4".to_string()))?;
                if netmask.parse::<std::net::Ipv4Addr>().is_err() {
                    return Err(invalid(format!("{:?} is not an IPv4 netmask", netmask)));
                }
            }
            IpType::IPv6 => {
                if self.ip.parse::<std::net::Ipv6Addr>().is_err() {
                    return Err(invalid(format!("{:?} is not an IPv6 address", self.ip)));
                }
                match self.prefix {
                    Some(1..=128) => {}
                    Some(p) => return Err(invalid(format!("prefix {} out of range 1..=128", p))),
                    None => return Err(invalid("prefix is required for IPv6".to_string())),
                }
            }
        }

        if let Some(vlan) = self.vlan_id {
            if vlan > 4096 {
                return Err(invalid(format!("vlan id {} out of range 0..=4096", vlan)));
            }
        }

        if let Some(lease) = self.lease_time_seconds {
            if lease > u64::from(u32::MAX) {
                return Err(invalid(format!("lease time {}s exceeds u32 range", lease)));
            }
        }

        Ok(())
    }
}

/// Operating System Installation Environment used when booting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Osie {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initrd_url: Option<String>,

    /// Parameters passed to the kernel, joined with a space.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kernel_params: Vec<String>,

    /// ISO used for the installation environment. Requires a BMC reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso_url: Option<String>,

    /// iPXE script override, inline or hosted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipxe: Option<Ipxe>,
}

/// iPXE script override. At least one field should be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ipxe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Instance-specific data served by a metadata service. The orchestrator
/// core does not interpret it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userdata: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendordata: Option<String>,
}

fn validate_storage_device(path: &str) -> Result<(), ValidationError> {
    if !DEVICE_PATH_PATTERN.is_match(path) {
        return Err(ValidationError::InvalidStorageDevice {
            path: path.to_string(),
            message: "must be a rooted absolute Unix path".to_string(),
        });
    }
    let basename = path.rsplit('/').next().unwrap_or(path);
    if PARTITION_PATTERN.is_match(basename) {
        return Err(ValidationError::InvalidStorageDevice {
            path: path.to_string(),
            message: "must name a whole disk, not a partition".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "hardware_tests.rs"]
mod tests;
