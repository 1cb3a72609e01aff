//! Socket-option side effects.

use std::mem;

use libc::{c_int, socklen_t};
use tracing::{debug, warn};

use cong_rules::Algorithm;

/// Whether the descriptor is a stream socket. `TCP_CONGESTION` only exists
/// on TCP sockets; datagram sockets that happen to match a rule are left
/// alone. The probe may clobber errno.
pub(crate) fn is_stream(fd: c_int) -> bool {
    let mut ty: c_int = 0;
    let mut len = mem::size_of::<c_int>() as socklen_t;
    let res = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_TYPE,
            (&mut ty as *mut c_int).cast(),
            &mut len,
        )
    };
    res == 0 && ty == libc::SOCK_STREAM
}

/// Sets the congestion-control algorithm on the socket. Failure (say, an
/// algorithm the kernel does not offer) is logged and swallowed; the
/// application's view of the intercepted call must not change.
pub(crate) fn set_congestion(fd: c_int, algo: Algorithm, call: &str) {
    let name = algo.name();
    let res = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_CONGESTION,
            name.as_ptr().cast(),
            name.len() as socklen_t,
        )
    };
    if res == 0 {
        debug!(fd, %algo, call, "congestion control set");
    } else {
        let err = std::io::Error::last_os_error();
        warn!(fd, %algo, call, %err, "could not set congestion control");
    }
}
