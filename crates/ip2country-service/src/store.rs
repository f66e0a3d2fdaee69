//! In-memory location store with exact and longest-prefix-match lookup.
//!
//! The store is built once from a flat list of rows and is read-only
//! afterwards, so any number of request handlers can resolve against it
//! without synchronization.
//!
//! Lookup order:
//! 1. exact address entries (always win, regardless of CIDR specificity),
//! 2. CIDR entries, scanning candidate prefix lengths from the address
//!    width (32 or 128) down to 0 and masking the address at each length.
//!
//! CIDR entries are bucketed by their network address. A bucket may hold
//! networks of different lengths that share a base address (`10.0.0.0/8`
//! and `10.0.0.0/16`), so every candidate is checked for containment.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::{IpNet, Ipv4Net};

use crate::error::{LoadError, NotFoundError};
use crate::location::Location;

/// Width of the IPv4-mapped IPv6 prefix (`::ffff:0:0/96`).
const V4_MAPPED_PREFIX: u8 = 96;

#[derive(Debug)]
struct CidrEntry {
    network: IpNet,
    location: Arc<Location>,
}

/// Immutable mapping from addresses and networks to locations.
#[derive(Debug)]
pub struct LocationStore {
    exact: HashMap<IpAddr, Arc<Location>>,
    cidr_by_network: HashMap<IpAddr, Vec<CidrEntry>>,
    cidr_len: usize,
}

impl LocationStore {
    /// Builds a store from rows of `[address-or-cidr, city, country]`.
    ///
    /// Rows with fewer than three fields or an unparsable address are
    /// skipped. Fails with [`LoadError::Empty`] if no row survives.
    pub fn build<I, R, S>(rows: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = LocationStoreBuilder::default();
        for row in rows {
            builder.push_row(row);
        }
        builder.finish()
    }

    /// Returns the location owning `addr`.
    ///
    /// IPv4-mapped IPv6 addresses resolve exactly like their IPv4 form.
    pub fn resolve(&self, addr: IpAddr) -> Result<&Arc<Location>, NotFoundError> {
        let addr = canonical_addr(addr);

        if let Some(location) = self.exact.get(&addr) {
            return Ok(location);
        }

        let max_len = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };

        for prefix_len in (0..=max_len).rev() {
            let Ok(candidate) = IpNet::new(addr, prefix_len) else {
                continue;
            };
            let Some(entries) = self.cidr_by_network.get(&candidate.network()) else {
                continue;
            };
            if let Some(entry) = entries.iter().find(|e| e.network.contains(&addr)) {
                return Ok(&entry.location);
            }
        }

        Err(NotFoundError { address: addr })
    }

    /// Number of exact address entries.
    pub fn exact_len(&self) -> usize {
        self.exact.len()
    }

    /// Number of CIDR entries, duplicates included.
    pub fn cidr_len(&self) -> usize {
        self.cidr_len
    }

    /// Total number of registered entries.
    pub fn len(&self) -> usize {
        self.exact.len() + self.cidr_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Incremental builder used by loaders that stream their rows.
#[derive(Debug, Default)]
pub struct LocationStoreBuilder {
    exact: HashMap<IpAddr, Arc<Location>>,
    cidr_by_network: HashMap<IpAddr, Vec<CidrEntry>>,
    cidr_len: usize,
    skipped: usize,
}

impl LocationStoreBuilder {
    /// Registers one row. Returns `false` if the row was skipped.
    pub fn push_row<R, S>(&mut self, row: R) -> bool
    where
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields = row.into_iter();
        let (Some(address), Some(city), Some(country)) =
            (fields.next(), fields.next(), fields.next())
        else {
            self.skipped += 1;
            return false;
        };

        let address = address.as_ref().trim();
        let location = Arc::new(Location::new(country.as_ref().trim(), city.as_ref().trim()));

        // CIDR first; a bare address never contains '/', so this only
        // falls through for plain addresses and garbage.
        if let Ok(network) = address.parse::<IpNet>() {
            let network = canonical_net(network);
            self.cidr_by_network
                .entry(network.network())
                .or_default()
                .push(CidrEntry { network, location });
            self.cidr_len += 1;
            return true;
        }

        if let Ok(addr) = address.parse::<IpAddr>() {
            self.exact.insert(canonical_addr(addr), location);
            return true;
        }

        self.skipped += 1;
        false
    }

    /// Sorts every bucket most-specific-first and freezes the store.
    pub fn finish(mut self) -> Result<LocationStore, LoadError> {
        if self.exact.is_empty() && self.cidr_by_network.is_empty() {
            return Err(LoadError::Empty);
        }

        // Stable sort: duplicate networks keep load order and both stay.
        for entries in self.cidr_by_network.values_mut() {
            entries.sort_by(|a, b| b.network.prefix_len().cmp(&a.network.prefix_len()));
        }

        tracing::debug!(
            exact = self.exact.len(),
            cidr = self.cidr_len,
            buckets = self.cidr_by_network.len(),
            skipped = self.skipped,
            "Location store built",
        );

        Ok(LocationStore {
            exact: self.exact,
            cidr_by_network: self.cidr_by_network,
            cidr_len: self.cidr_len,
        })
    }
}

/// Collapses IPv4-mapped IPv6 addresses onto their IPv4 form.
fn canonical_addr(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(addr, IpAddr::V4),
        IpAddr::V4(_) => addr,
    }
}

/// Zeroes host bits and rewrites networks inside `::ffff:0:0/96` as IPv4.
fn canonical_net(network: IpNet) -> IpNet {
    let network = network.trunc();
    if let IpNet::V6(v6) = network
        && v6.prefix_len() >= V4_MAPPED_PREFIX
        && let Some(base) = v6.network().to_ipv4_mapped()
        && let Ok(mapped) = Ipv4Net::new(base, v6.prefix_len() - V4_MAPPED_PREFIX)
    {
        return IpNet::V4(mapped);
    }
    network
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn store(rows: &[[&str; 3]]) -> LocationStore {
        LocationStore::build(rows.iter().map(|r| r.iter().copied())).unwrap()
    }

    #[test]
    fn end_to_end_example() {
        let s = store(&[
            ["203.0.113.0/24", "Paris", "FR"],
            ["198.51.100.7", "Austin", "US"],
        ]);

        assert_eq!(
            **s.resolve(ip("203.0.113.42")).unwrap(),
            Location::new("FR", "Paris")
        );
        assert_eq!(
            **s.resolve(ip("198.51.100.7")).unwrap(),
            Location::new("US", "Austin")
        );
        assert_eq!(
            s.resolve(ip("8.8.8.8")).unwrap_err(),
            NotFoundError {
                address: ip("8.8.8.8")
            }
        );
    }

    #[test]
    fn longest_prefix_wins() {
        let s = store(&[
            ["10.0.0.0/8", "Wide", "L1"],
            ["10.1.0.0/16", "Narrow", "L2"],
        ]);
        assert_eq!(s.resolve(ip("10.1.2.3")).unwrap().country, "L2");
        assert_eq!(s.resolve(ip("10.2.2.3")).unwrap().country, "L1");
    }

    #[test]
    fn shared_network_address_checks_containment() {
        // Both networks land in the "10.0.0.0" bucket.
        let s = store(&[
            ["10.0.0.0/8", "Wide", "L1"],
            ["10.0.0.0/16", "Narrow", "L2"],
        ]);
        assert_eq!(s.resolve(ip("10.0.5.5")).unwrap().country, "L2");
        assert_eq!(s.resolve(ip("10.5.0.1")).unwrap().country, "L1");
    }

    #[test]
    fn exact_match_beats_more_specific_cidr() {
        let s = store(&[
            ["192.0.2.0/31", "Net", "CIDR"],
            ["192.0.2.1", "Host", "EXACT"],
        ]);
        assert_eq!(s.resolve(ip("192.0.2.1")).unwrap().country, "EXACT");
        assert_eq!(s.resolve(ip("192.0.2.0")).unwrap().country, "CIDR");
    }

    #[test]
    fn host_bits_in_cidr_are_zeroed() {
        let s = store(&[["10.1.2.3/8", "Wide", "L1"]]);
        assert_eq!(s.resolve(ip("10.200.0.1")).unwrap().country, "L1");
    }

    #[test]
    fn default_route_matches_everything_of_its_family() {
        let s = store(&[["0.0.0.0/0", "Anywhere", "ZZ"]]);
        assert_eq!(s.resolve(ip("255.255.255.255")).unwrap().country, "ZZ");
        assert!(s.resolve(ip("2001:db8::1")).is_err());
    }

    #[test]
    fn ipv6_prefixes() {
        let s = store(&[
            ["2001:db8::/32", "Docs", "D1"],
            ["2001:db8:abcd::/48", "Docs48", "D2"],
            ["2001:db8::42", "Host", "D3"],
        ]);
        assert_eq!(s.resolve(ip("2001:db8:abcd:1::9")).unwrap().country, "D2");
        assert_eq!(s.resolve(ip("2001:db8:1::9")).unwrap().country, "D1");
        assert_eq!(s.resolve(ip("2001:0db8:0000::0042")).unwrap().country, "D3");
        assert!(s.resolve(ip("2001:db9::1")).is_err());
    }

    #[test]
    fn ipv4_mapped_forms_are_equivalent() {
        let s = store(&[
            ["::ffff:198.51.100.7", "Austin", "US"],
            ["::ffff:203.0.113.0/120", "Paris", "FR"],
        ]);
        assert_eq!(s.resolve(ip("198.51.100.7")).unwrap().city, "Austin");
        assert_eq!(s.resolve(ip("::ffff:198.51.100.7")).unwrap().city, "Austin");
        assert_eq!(s.resolve(ip("203.0.113.9")).unwrap().city, "Paris");
        assert_eq!(s.resolve(ip("::ffff:203.0.113.9")).unwrap().city, "Paris");
    }

    #[test]
    fn rows_are_trimmed_and_bad_rows_skipped() {
        let rows: Vec<Vec<&str>> = vec![
            vec!["  198.51.100.7 ", " Austin ", " US "],
            vec!["not-an-ip", "Nowhere", "XX"],
            vec!["10.0.0.0/33", "Nowhere", "XX"],
            vec!["10.0.0.1", "TooShort"],
            vec![],
        ];
        let s = LocationStore::build(rows).unwrap();
        assert_eq!(s.exact_len(), 1);
        assert_eq!(s.cidr_len(), 0);
        assert_eq!(
            **s.resolve(ip("198.51.100.7")).unwrap(),
            Location::new("US", "Austin")
        );
    }

    #[test]
    fn duplicate_exact_rows_last_write_wins() {
        let s = store(&[
            ["198.51.100.7", "Austin", "US"],
            ["198.51.100.7", "Dallas", "US"],
        ]);
        assert_eq!(s.exact_len(), 1);
        assert_eq!(s.resolve(ip("198.51.100.7")).unwrap().city, "Dallas");
    }

    #[test]
    fn duplicate_cidr_rows_coexist_in_load_order() {
        let s = store(&[
            ["203.0.113.0/24", "Paris", "FR"],
            ["203.0.113.0/24", "Lyon", "FR"],
        ]);
        assert_eq!(s.cidr_len(), 2);
        assert_eq!(s.resolve(ip("203.0.113.1")).unwrap().city, "Paris");
    }

    #[test]
    fn empty_input_is_a_load_error() {
        let rows: Vec<[&str; 3]> = vec![["garbage", "x", "y"]];
        assert!(matches!(
            LocationStore::build(rows),
            Err(LoadError::Empty)
        ));
        assert!(matches!(
            LocationStore::build(Vec::<Vec<String>>::new()),
            Err(LoadError::Empty)
        ));
    }

    #[test]
    fn negative_lookup_is_repeatable() {
        let s = store(&[["203.0.113.0/24", "Paris", "FR"]]);
        let first = s.resolve(ip("8.8.8.8")).unwrap_err();
        for _ in 0..3 {
            assert_eq!(s.resolve(ip("8.8.8.8")).unwrap_err(), first);
        }
        assert_eq!(s.len(), 1);
    }
}
