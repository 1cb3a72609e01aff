//! The `connect(2)` entry point.

use libc::{c_int, sockaddr, socklen_t};

use cong_rules::CallKind;

use crate::{errno, logging, peer, real, sockopt, store};

/// Drop-in replacement for `connect(2)`.
///
/// Forwards to the real routine with the caller's arguments untouched. On
/// success — or on the `EINPROGRESS` outcome of a non-blocking connect —
/// the peer address is matched against the rule store and a matching rule's
/// congestion-control algorithm is applied to the socket, provided it is a
/// stream socket. The real call's result and errno are returned exactly as
/// produced; the side effect can never alter them.
///
/// # Safety
/// Same contract as `connect(2)`: `addr` must point to at least `len`
/// readable bytes of a valid socket address.
#[no_mangle]
pub unsafe extern "C" fn connect(fd: c_int, addr: *const sockaddr, len: socklen_t) -> c_int {
    logging::init();

    let Some(real_connect) = real::connect() else {
        errno::set(libc::ENOSYS);
        return -1;
    };

    let res = real_connect(fd, addr, len);
    let saved_errno = errno::get();
    if res != 0 && saved_errno != libc::EINPROGRESS {
        return res;
    }

    if let Some(ip) = peer::from_sockaddr(addr, len) {
        if let Some(algo) = store::get().lookup(CallKind::Connect, ip) {
            if sockopt::is_stream(fd) {
                sockopt::set_congestion(fd, algo, "connect");
            }
        }
    }

    // The stream probe and any logging may have touched errno.
    errno::set(saved_errno);
    res
}
