//! IPv4 helpers and libvirt network definitions.

use std::fmt::Write;
use std::net::Ipv4Addr;

use crate::error::HypervisorError;

/// A NAT network derived from a CIDR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDefinition {
    /// Network name.
    pub name: String,
    /// Host address on the bridge, first usable address of the range.
    pub gateway: Ipv4Addr,
    /// Netmask of the range.
    pub netmask: Ipv4Addr,
    /// DHCP range, when DHCP is enabled.
    pub dhcp_range: Option<(Ipv4Addr, Ipv4Addr)>,
}

impl NetworkDefinition {
    /// Builds a definition from a CIDR such as `192.168.122.0/24`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name is not a plain identifier, or
    /// the CIDR is malformed or leaves no room for a gateway and a guest.
    pub fn from_cidr(name: &str, cidr: &str, dhcp: bool) -> Result<Self, HypervisorError> {
        check_name(name)?;
        let (address, prefix) = cidr
            .trim()
            .split_once('/')
            .ok_or_else(|| HypervisorError::invalid_argument(format!("Invalid cidr {cidr}")))?;
        let address: Ipv4Addr = address
            .parse()
            .map_err(|_| HypervisorError::invalid_argument(format!("Invalid cidr {cidr}")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| HypervisorError::invalid_argument(format!("Invalid cidr {cidr}")))?;
        if prefix > 30 {
            return Err(HypervisorError::invalid_argument(format!(
                "Cidr {cidr} is too small for a network"
            )));
        }

        let mask = u32::from(prefix_to_netmask(prefix));
        let network = u32::from(address) & mask;
        let broadcast = network | !mask;

        Ok(Self {
            name: name.to_string(),
            gateway: Ipv4Addr::from(network + 1),
            netmask: Ipv4Addr::from(mask),
            dhcp_range: dhcp.then(|| (Ipv4Addr::from(network + 2), Ipv4Addr::from(broadcast - 1))),
        })
    }

    /// Renders the libvirt network XML.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();

        let _ = writeln!(xml, "<network>");
        let _ = writeln!(xml, "  <name>{}</name>", self.name);
        let _ = writeln!(xml, "  <forward mode='nat'>");
        let _ = writeln!(xml, "    <nat><port start='1024' end='65535'/></nat>");
        let _ = writeln!(xml, "  </forward>");
        let _ = writeln!(xml, "  <domain name='{}'/>", self.name);
        let _ = writeln!(xml, "  <ip address='{}' netmask='{}'>", self.gateway, self.netmask);
        if let Some((start, end)) = self.dhcp_range {
            let _ = writeln!(xml, "    <dhcp>");
            let _ = writeln!(xml, "      <range start='{start}' end='{end}'/>");
            let _ = writeln!(xml, "    </dhcp>");
        }
        let _ = writeln!(xml, "  </ip>");
        let _ = writeln!(xml, "</network>");

        xml
    }
}

/// Network names end up in XML and in file names, so only letters, digits,
/// `-`, `_` and `.` are accepted.
fn check_name(name: &str) -> Result<(), HypervisorError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(HypervisorError::invalid_argument(format!(
            "Invalid network name {name}"
        )))
    }
}

/// Converts a prefix length to a dotted netmask.
#[must_use]
pub fn prefix_to_netmask(prefix: u8) -> Ipv4Addr {
    if prefix == 0 {
        Ipv4Addr::UNSPECIFIED
    } else {
        Ipv4Addr::from(u32::MAX << (32 - u32::from(prefix.min(32))))
    }
}

/// Converts a dotted netmask (or a bare prefix) to a prefix length.
#[must_use]
pub fn netmask_to_prefix(netmask: &str) -> Option<u32> {
    let netmask = netmask.trim();
    if let Ok(prefix) = netmask.parse::<u32>() {
        return (prefix <= 32).then_some(prefix);
    }
    let mask = u32::from(netmask.parse::<Ipv4Addr>().ok()?);
    // Contiguous masks only.
    (mask.leading_ones() == mask.count_ones()).then(|| mask.count_ones())
}
