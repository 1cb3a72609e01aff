//! Peer-address extraction from raw socket addresses.

use std::{
    mem,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use libc::{c_int, sa_family_t, sockaddr, sockaddr_in, sockaddr_in6, socklen_t};

/// Extracts the IP address from a raw `sockaddr`, if it belongs to an IP
/// family and `len` covers the family's address structure. Ports play no
/// part in range matching and are discarded; non-IP families (e.g. unix
/// domain sockets) yield `None` and are never matched.
///
/// # Safety
/// `addr` must either be null or point to at least `len` readable bytes of
/// a valid socket address.
pub(crate) unsafe fn from_sockaddr(addr: *const sockaddr, len: socklen_t) -> Option<IpAddr> {
    if addr.is_null() || (len as usize) < mem::size_of::<sa_family_t>() {
        return None;
    }

    match c_int::from((*addr).sa_family) {
        libc::AF_INET => {
            if (len as usize) < mem::size_of::<sockaddr_in>() {
                return None;
            }
            let sin = &*addr.cast::<sockaddr_in>();
            // s_addr is in network byte order.
            Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr))))
        }
        libc::AF_INET6 => {
            if (len as usize) < mem::size_of::<sockaddr_in6>() {
                return None;
            }
            let sin6 = &*addr.cast::<sockaddr_in6>();
            Some(IpAddr::V6(Ipv6Addr::from(sin6.sin6_addr.s6_addr)))
        }
        _ => None,
    }
}
