//! CIDR address-range parsing and matching.
//!
//! An [`IpNetwork`] pairs an IPv4 or IPv6 address with a prefix length and
//! answers membership queries over either family. Peer addresses arriving
//! on dual-stack sockets should be passed through [`normalize`] once before
//! matching, so that an IPv4-mapped IPv6 peer can match a plain IPv4 range.

use std::{
    fmt,
    net::IpAddr,
    str::FromStr,
};

use thiserror::Error;

/// Errors produced when parsing an address range.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The address literal is not a valid numeric IPv4 or IPv6 address.
    #[error("invalid address literal: {0:?}")]
    Address(String),
    /// The prefix length after the slash is empty, non-numeric or negative.
    #[error("invalid prefix length: {0:?}")]
    Prefix(String),
    /// The prefix length exceeds the address family's bit width.
    #[error("prefix length {len} exceeds the {width}-bit family width")]
    PrefixTooLong {
        /// The rejected prefix length.
        len: u8,
        /// Bit width of the address family.
        width: u8,
    },
}

/// An address range in CIDR form: a family-tagged address plus a prefix
/// length no larger than the family's bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    /// Creates a range, rejecting prefix lengths beyond the family width.
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, ParseError> {
        let width = family_width(&addr);
        if prefix > width {
            return Err(ParseError::PrefixTooLong { len: prefix, width });
        }
        Ok(Self { addr, prefix })
    }

    /// The range's base address.
    pub const fn addr(&self) -> IpAddr {
        self.addr
    }

    /// The prefix length in bits.
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Whether `ip` falls inside this range.
    ///
    /// Addresses of a different family never match; callers should
    /// [`normalize`] the candidate first. A prefix length of 0 matches
    /// every address of the family, a full-width prefix requires exact
    /// equality, and anything in between compares the top `prefix` bits
    /// in network byte order.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                if self.prefix == 0 {
                    return true;
                }
                let mask = u32::MAX << (32 - u32::from(self.prefix));
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                if self.prefix == 0 {
                    return true;
                }
                let mask = u128::MAX << (128 - u32::from(self.prefix));
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for IpNetwork {
    type Err = ParseError;

    /// Parses `<address>[/<prefix>]`. IPv6 literals may be bracketed.
    /// A missing prefix implies the family's full width.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (literal, prefix) = match s.rsplit_once('/') {
            Some((literal, prefix)) => (literal, Some(prefix)),
            None => (s, None),
        };

        let bare = literal
            .strip_prefix('[')
            .and_then(|l| l.strip_suffix(']'))
            .unwrap_or(literal);

        // Std's numeric parsers only: no DNS, no hostnames.
        let addr = IpAddr::from_str(bare)
            .map_err(|_| ParseError::Address(literal.to_owned()))?;

        let prefix = match prefix {
            Some(p) => p.parse::<u8>().map_err(|_| ParseError::Prefix(p.to_owned()))?,
            None => family_width(&addr),
        };

        Self::new(addr, prefix)
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            IpAddr::V4(addr) => write!(f, "{}/{}", addr, self.prefix),
            IpAddr::V6(addr) => write!(f, "[{}]/{}", addr, self.prefix),
        }
    }
}

/// Rewrites an IPv4-mapped IPv6 address (`::ffff:a.b.c.d`) as the plain
/// IPv4 address it carries; every other address is returned unchanged.
///
/// Dual-stack listeners report IPv4 peers in mapped form, so this must run
/// once on the peer address before any range comparison.
pub fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => ip,
        },
        IpAddr::V4(_) => ip,
    }
}

const fn family_width(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}
