//! The `accept(2)` and `accept4(2)` entry points.

use std::mem;

use libc::{c_int, sockaddr, sockaddr_storage, socklen_t};

use cong_rules::CallKind;

use crate::{errno, logging, peer, real, sockopt, store};

/// Drop-in replacement for `accept(2)`.
///
/// Forwards to the real routine. When the caller passed no address buffer,
/// a private one is substituted so the peer is still available for
/// matching; the substitution is invisible through the caller's arguments.
/// On success, a matching rule's congestion-control algorithm is applied to
/// the newly accepted descriptor, and the descriptor is returned unchanged.
///
/// # Safety
/// Same contract as `accept(2)`: `addr` and `len` must be null or point to
/// valid, writable storage.
#[no_mangle]
pub unsafe extern "C" fn accept(fd: c_int, addr: *mut sockaddr, len: *mut socklen_t) -> c_int {
    logging::init();

    let Some(real_accept) = real::accept() else {
        errno::set(libc::ENOSYS);
        return -1;
    };

    let mut storage: sockaddr_storage = mem::zeroed();
    let mut storage_len = mem::size_of::<sockaddr_storage>() as socklen_t;
    let (addr, len) = if addr.is_null() {
        ((&mut storage as *mut sockaddr_storage).cast(), &mut storage_len as *mut socklen_t)
    } else {
        (addr, len)
    };
    let capacity = if len.is_null() { 0 } else { *len };

    let res = real_accept(fd, addr, len);
    if res < 0 {
        return res;
    }

    apply(res, addr, len, capacity, "accept");
    res
}

/// Drop-in replacement for `accept4(2)`. Identical to [`accept`] with the
/// flags argument forwarded verbatim.
///
/// # Safety
/// Same contract as `accept4(2)`.
#[no_mangle]
pub unsafe extern "C" fn accept4(
    fd: c_int,
    addr: *mut sockaddr,
    len: *mut socklen_t,
    flags: c_int,
) -> c_int {
    logging::init();

    let Some(real_accept4) = real::accept4() else {
        errno::set(libc::ENOSYS);
        return -1;
    };

    let mut storage: sockaddr_storage = mem::zeroed();
    let mut storage_len = mem::size_of::<sockaddr_storage>() as socklen_t;
    let (addr, len) = if addr.is_null() {
        ((&mut storage as *mut sockaddr_storage).cast(), &mut storage_len as *mut socklen_t)
    } else {
        (addr, len)
    };
    let capacity = if len.is_null() { 0 } else { *len };

    let res = real_accept4(fd, addr, len, flags);
    if res < 0 {
        return res;
    }

    apply(res, addr, len, capacity, "accept4");
    res
}

/// Matches the accepted peer against the rule store and applies a selected
/// algorithm to the new descriptor `conn`. `capacity` is the buffer length
/// the caller supplied before the call: the kernel reports the peer's full
/// length through `*len` even when it truncated the address to fit, so only
/// the smaller of the two is trusted.
unsafe fn apply(
    conn: c_int,
    addr: *const sockaddr,
    len: *const socklen_t,
    capacity: socklen_t,
    call: &str,
) {
    if len.is_null() {
        return;
    }
    let Some(ip) = peer::from_sockaddr(addr, (*len).min(capacity)) else {
        return;
    };
    if let Some(algo) = store::get().lookup(CallKind::Accept, ip) {
        sockopt::set_congestion(conn, algo, call);
    }
}
