//! IPv4 CIDR blocks and sequential sub-block allocation.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use stackweave_common::error::{Result, TopologyError};

/// An IPv4 network in CIDR notation, e.g. `10.0.0.0/20`.
///
/// Host bits are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ipv4Cidr {
    network: u32,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Creates a block from a network address and prefix length.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the prefix exceeds 32 or the
    /// address has host bits set.
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(TopologyError::config(format!(
                "prefix length {prefix} exceeds 32"
            )));
        }
        let network = u32::from(address);
        if network & !mask_bits(prefix) != 0 {
            return Err(TopologyError::config(format!(
                "{address}/{prefix} has host bits set"
            )));
        }
        Ok(Self { network, prefix })
    }

    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Returns the network address.
    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    /// Returns the last address in the block.
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.last())
    }

    /// Number of addresses in the block.
    #[must_use]
    pub const fn size(&self) -> u64 {
        1u64 << (32 - self.prefix as u32)
    }

    const fn first(&self) -> u32 {
        self.network
    }

    const fn last(&self) -> u32 {
        self.network | !mask_bits(self.prefix)
    }

    /// Whether `other` lies entirely inside this block.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.first() >= self.first() && other.last() <= self.last()
    }

    /// Whether the two blocks share at least one address.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }
}

const fn mask_bits(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix as u32)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| TopologyError::config(format!("invalid CIDR \"{s}\": missing '/'")))?;
        let address = Ipv4Addr::from_str(addr)
            .map_err(|_| TopologyError::config(format!("invalid CIDR \"{s}\": bad address")))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|_| TopologyError::config(format!("invalid CIDR \"{s}\": bad prefix")))?;
        Self::new(address, prefix)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

impl Serialize for Ipv4Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Hands out consecutive, aligned, non-overlapping sub-blocks of a parent.
#[derive(Debug, Clone)]
pub struct CidrAllocator {
    parent: Ipv4Cidr,
    /// Offset of the next free address, relative to the parent network.
    next: u64,
}

impl CidrAllocator {
    /// Creates an allocator over the whole of `parent`.
    #[must_use]
    pub const fn new(parent: Ipv4Cidr) -> Self {
        Self { parent, next: 0 }
    }

    /// Allocates the next free block with the given prefix length.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the mask is shorter than the parent
    /// prefix or the block does not fit in the remaining space.
    pub fn allocate(&mut self, prefix: u8) -> Result<Ipv4Cidr> {
        if prefix < self.parent.prefix() || prefix > 32 {
            return Err(TopologyError::config(format!(
                "mask /{prefix} cannot be carved out of {}",
                self.parent
            )));
        }
        let size = 1u64 << (32 - u32::from(prefix));
        let start = self.next.div_ceil(size) * size;
        if start + size > self.parent.size() {
            return Err(TopologyError::config(format!(
                "/{prefix} block does not fit in the remaining space of {}",
                self.parent
            )));
        }
        self.next = start + size;
        let offset = u32::try_from(start)
            .map_err(|_| TopologyError::config(format!("offset {start} out of range")))?;
        Ipv4Cidr::new(Ipv4Addr::from(self.parent.first() + offset), prefix)
    }

    /// Number of addresses not yet handed out.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.parent.size() - self.next
    }
}
