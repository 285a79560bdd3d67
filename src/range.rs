//! Merged interval sets over the IPv4 and IPv6 address spaces.
//!
//! Every CIDR block or single address becomes a closed interval of unsigned
//! integers. IPv4 and IPv6 intervals are kept apart so a 32-bit value never
//! matches an IPv6 range that happens to cover the same number.

use ipnet::IpNet;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Address family of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

/// Error returned when a range literal cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid address range '{input}': {reason}")]
pub struct RangeParseError {
    /// The literal that failed to parse.
    pub input: String,
    /// Why it was rejected.
    pub reason: String,
}

/// A closed interval `[low, high]` of one address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    family: Family,
    low: u128,
    high: u128,
}

impl AddressRange {
    /// Degenerate range holding a single address.
    pub fn single(ip: IpAddr) -> Self {
        let (family, value) = address_key(&ip);
        Self {
            family,
            low: value,
            high: value,
        }
    }

    /// Range covering every address of a network. Host bits are ignored.
    pub fn from_net(net: IpNet) -> Self {
        let net = net.trunc();
        let (family, low) = address_key(&net.network());
        let (_, high) = address_key(&net.broadcast());
        Self { family, low, high }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Lower bound, inclusive.
    pub fn low(&self) -> u128 {
        self.low
    }

    /// Upper bound, inclusive.
    pub fn high(&self) -> u128 {
        self.high
    }

    /// Check if an address falls inside this range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let (family, value) = address_key(ip);
        family == self.family && self.low <= value && value <= self.high
    }
}

impl FromStr for AddressRange {
    type Err = RangeParseError;

    /// Parse `address/prefix` or a bare address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let literal = s.trim();
        let error = |reason: String| RangeParseError {
            input: literal.to_string(),
            reason,
        };

        if literal.contains('/') {
            literal
                .parse::<IpNet>()
                .map(Self::from_net)
                .map_err(|e| error(e.to_string()))
        } else {
            literal
                .parse::<IpAddr>()
                .map(Self::single)
                .map_err(|e| error(e.to_string()))
        }
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            Family::V4 => write!(
                f,
                "{}-{}",
                std::net::Ipv4Addr::from(self.low as u32),
                std::net::Ipv4Addr::from(self.high as u32)
            ),
            Family::V6 => write!(
                f,
                "{}-{}",
                std::net::Ipv6Addr::from(self.low),
                std::net::Ipv6Addr::from(self.high)
            ),
        }
    }
}

/// Integer form of an address. IPv4-mapped IPv6 addresses count as IPv4.
fn address_key(ip: &IpAddr) -> (Family, u128) {
    match ip.to_canonical() {
        IpAddr::V4(v4) => (Family::V4, u128::from(u32::from(v4))),
        IpAddr::V6(v6) => (Family::V6, u128::from(v6)),
    }
}

/// Sorted, disjoint, non-touching intervals keyed by lower bound.
#[derive(Debug, Clone, Default)]
struct Intervals(BTreeMap<u128, u128>);

impl Intervals {
    fn insert(&mut self, mut low: u128, mut high: u128) {
        // Predecessor that overlaps or touches the new interval.
        if let Some((&start, &end)) = self.0.range(..=low).next_back() {
            if end.saturating_add(1) >= low {
                low = start;
                high = high.max(end);
                self.0.remove(&start);
            }
        }

        let upper = high.saturating_add(1);
        let absorbed: Vec<u128> = self.0.range(low..=upper).map(|(&start, _)| start).collect();
        for start in absorbed {
            if let Some(end) = self.0.remove(&start) {
                high = high.max(end);
            }
        }

        self.0.insert(low, high);
    }

    fn contains(&self, value: u128) -> bool {
        self.0
            .range(..=value)
            .next_back()
            .is_some_and(|(_, &end)| value <= end)
    }
}

/// Set of address ranges kept in merged form.
///
/// Built once and then only read, so no interior locking is needed.
#[derive(Debug, Clone, Default)]
pub struct RangeSet {
    v4: Intervals,
    v6: Intervals,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a range, merging it with overlapping or adjacent ranges.
    pub fn add(&mut self, range: AddressRange) {
        match range.family {
            Family::V4 => self.v4.insert(range.low, range.high),
            Family::V6 => self.v6.insert(range.low, range.high),
        }
    }

    /// Check if an address lies inside any stored range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let (family, value) = address_key(ip);
        match family {
            Family::V4 => self.v4.contains(value),
            Family::V6 => self.v6.contains(value),
        }
    }

    /// Number of merged ranges across both families.
    pub fn len(&self) -> usize {
        self.v4.0.len() + self.v6.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merged ranges, IPv4 first, each family in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = AddressRange> + '_ {
        let v4 = self.v4.0.iter().map(|(&low, &high)| AddressRange {
            family: Family::V4,
            low,
            high,
        });
        let v6 = self.v6.0.iter().map(|(&low, &high)| AddressRange {
            family: Family::V6,
            low,
            high,
        });
        v4.chain(v6)
    }
}

impl Extend<AddressRange> for RangeSet {
    fn extend<T: IntoIterator<Item = AddressRange>>(&mut self, iter: T) {
        for range in iter {
            self.add(range);
        }
    }
}

impl FromIterator<AddressRange> for RangeSet {
    fn from_iter<T: IntoIterator<Item = AddressRange>>(iter: T) -> Self {
        let mut set = RangeSet::new();
        set.extend(iter);
        set
    }
}
