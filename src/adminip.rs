use std::net::{IpAddr, Ipv6Addr};

use tracing::debug;

use crate::config::ADMINIP_MAX;
use crate::error::TrackerError;

/// May request fullscrapes.
pub const MAY_FULLSCRAPE: u8 = 0x1;
/// May fetch statistics.
pub const MAY_STAT: u8 = 0x2;
/// May feed the live sync stream.
pub const MAY_LIVESYNC: u8 = 0x4;
/// May announce on behalf of other addresses.
pub const MAY_PROXY: u8 = 0x8;

/// Bounded table of administrative addresses and their permission bits,
/// consulted by the request handler before privileged operations. Grows
/// only through configuration and never shrinks.
#[derive(Debug, Default)]
pub struct AdminIpTable {
    entries: Vec<(Ipv6Addr, u8)>,
}

impl AdminIpTable {
    pub fn new() -> AdminIpTable {
        AdminIpTable {
            entries: Vec::with_capacity(ADMINIP_MAX),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Grants `permissions` to `ip`. A full table is a permanent error.
    pub fn bless(&mut self, ip: IpAddr, permissions: u8) -> Result<(), TrackerError> {
        if self.entries.len() >= ADMINIP_MAX {
            return Err(TrackerError::AdminTableFull);
        }

        debug!(%ip, permissions, "blessing admin address");
        self.entries.push((canonical(ip), permissions));

        Ok(())
    }

    /// Whether some entry matches `ip` exactly and shares at least one of
    /// the `required` bits.
    pub fn is_blessed(&self, ip: IpAddr, required: u8) -> bool {
        let ip = canonical(ip);

        self.entries
            .iter()
            .any(|(address, permissions)| *address == ip && permissions & required != 0)
    }
}

/// Addresses are stored as 16 bytes; IPv4 in its v4-mapped form.
fn canonical(ip: IpAddr) -> Ipv6Addr {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        IpAddr::V6(v6) => v6,
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn v4(last_octet: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 0, last_octet))
    }

    #[test]
    fn blessed_address_passes_with_matching_bits() {
        let mut table = AdminIpTable::new();
        table.bless(v4(1), MAY_FULLSCRAPE | MAY_STAT).unwrap();

        assert!(table.is_blessed(v4(1), MAY_FULLSCRAPE));
        assert!(table.is_blessed(v4(1), MAY_STAT | MAY_PROXY));
        assert!(!table.is_blessed(v4(1), MAY_PROXY));
        assert!(!table.is_blessed(v4(2), MAY_FULLSCRAPE));
    }

    #[test]
    fn v4_and_mapped_v6_compare_equal() {
        let mut table = AdminIpTable::new();
        table.bless(v4(1), MAY_LIVESYNC).unwrap();

        let mapped = IpAddr::V6(Ipv4Addr::new(192, 168, 0, 1).to_ipv6_mapped());

        assert!(table.is_blessed(mapped, MAY_LIVESYNC));
    }

    #[test]
    fn table_capacity_is_a_permanent_error() {
        let mut table = AdminIpTable::new();

        for index in 0..ADMINIP_MAX {
            table.bless(v4(index as u8), MAY_STAT).unwrap();
        }

        assert_eq!(
            table.bless(v4(255), MAY_STAT),
            Err(TrackerError::AdminTableFull)
        );
        assert_eq!(table.len(), ADMINIP_MAX);
    }

    #[test]
    fn zero_permissions_never_match() {
        let mut table = AdminIpTable::new();
        table.bless(v4(1), 0).unwrap();

        assert!(!table.is_blessed(v4(1), MAY_FULLSCRAPE | MAY_STAT | MAY_LIVESYNC | MAY_PROXY));
    }
}
