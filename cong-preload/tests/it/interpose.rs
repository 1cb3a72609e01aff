//! End-to-end tests driving the exported hooks against a loopback listener.
//!
//! The rule store is a process-wide singleton, so every test shares one
//! config written before the first interception. Only algorithms in the
//! kernel's default allowed list (`reno`, `cubic`) are used.

use std::{
    io::Write,
    mem,
    net::{SocketAddr, TcpListener},
    os::fd::AsRawFd,
    path::Path,
    ptr,
    sync::OnceLock,
};

use libc::{c_int, sa_family_t, sockaddr, sockaddr_in, sockaddr_storage, socklen_t};
use tempfile::NamedTempFile;

const RULES: &str = "\
# integration config: loopback connects get cubic, accepts get reno.
connect: 0.0.0.0/0: reno
connect: 127.0.0.0/8: cubic
accept: 0.0.0.0/0: reno
";

fn config() -> &'static Path {
    static FILE: OnceLock<NamedTempFile> = OnceLock::new();
    FILE.get_or_init(|| {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(RULES.as_bytes()).unwrap();
        file.flush().unwrap();
        std::env::set_var(cong_rules::CFG_ENV, file.path());
        file
    })
    .path()
}

fn tcp_socket() -> c_int {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    assert!(fd >= 0, "socket: {}", std::io::Error::last_os_error());
    fd
}

fn sockaddr_of(addr: SocketAddr) -> sockaddr_in {
    let SocketAddr::V4(v4) = addr else {
        panic!("expected a v4 loopback address")
    };
    let mut sin: sockaddr_in = unsafe { mem::zeroed() };
    sin.sin_family = libc::AF_INET as sa_family_t;
    sin.sin_port = v4.port().to_be();
    sin.sin_addr.s_addr = u32::from(*v4.ip()).to_be();
    sin
}

fn congestion_of(fd: c_int) -> String {
    let mut buf = [0u8; 16];
    let mut len = buf.len() as socklen_t;
    let res = unsafe {
        libc::getsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_CONGESTION,
            buf.as_mut_ptr().cast(),
            &mut len,
        )
    };
    assert_eq!(res, 0, "getsockopt: {}", std::io::Error::last_os_error());
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Connects `fd` to `addr` through the exported hook.
fn hook_connect(fd: c_int, sin: &sockaddr_in) -> c_int {
    unsafe {
        cong_preload::connect(
            fd,
            (sin as *const sockaddr_in).cast::<sockaddr>(),
            mem::size_of::<sockaddr_in>() as socklen_t,
        )
    }
}

#[test]
fn connect_applies_matching_rule_and_preserves_result() {
    config();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let sin = sockaddr_of(listener.local_addr().unwrap());

    let fd = tcp_socket();
    let res = hook_connect(fd, &sin);
    assert_eq!(res, 0, "connect: {}", std::io::Error::last_os_error());
    // The more specific 127.0.0.0/8 line overrides the 0.0.0.0/0 default.
    assert_eq!(congestion_of(fd), "cubic");

    unsafe { libc::close(fd) };
}

#[test]
fn accept_with_null_buffer_applies_rule_to_new_descriptor() {
    config();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let sin = sockaddr_of(listener.local_addr().unwrap());

    let client = tcp_socket();
    assert_eq!(hook_connect(client, &sin), 0);

    // No caller buffer: the hook must fall back to its private one.
    let conn =
        unsafe { cong_preload::accept(listener.as_raw_fd(), ptr::null_mut(), ptr::null_mut()) };
    assert!(conn >= 0, "accept: {}", std::io::Error::last_os_error());
    assert_eq!(congestion_of(conn), "reno");

    unsafe {
        libc::close(conn);
        libc::close(client);
    }
}

#[test]
fn accept4_reports_peer_through_caller_buffer() {
    config();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let sin = sockaddr_of(listener.local_addr().unwrap());

    let client = tcp_socket();
    assert_eq!(hook_connect(client, &sin), 0);

    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;
    let conn = unsafe {
        cong_preload::accept4(
            listener.as_raw_fd(),
            (&mut storage as *mut sockaddr_storage).cast::<sockaddr>(),
            &mut len,
            0,
        )
    };
    assert!(conn >= 0, "accept4: {}", std::io::Error::last_os_error());
    assert_eq!(congestion_of(conn), "reno");

    // The caller's buffer still carries the real peer address.
    assert_eq!(c_int::from(storage.ss_family), libc::AF_INET);
    let peer = unsafe { &*(&storage as *const sockaddr_storage).cast::<sockaddr_in>() };
    assert_eq!(u32::from_be(peer.sin_addr.s_addr), u32::from(std::net::Ipv4Addr::LOCALHOST));

    unsafe {
        libc::close(conn);
        libc::close(client);
    }
}

#[test]
fn accept4_with_truncated_buffer_skips_matching() {
    config();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let sin = sockaddr_of(listener.local_addr().unwrap());

    let default_algo = {
        let fd = tcp_socket();
        let algo = congestion_of(fd);
        unsafe { libc::close(fd) };
        algo
    };

    let client = tcp_socket();
    assert_eq!(hook_connect(client, &sin), 0);

    // Aligned storage, but the caller claims only 8 bytes of capacity. The
    // kernel truncates the written address and reports the full length; the
    // truncated peer must not be matched against the rules.
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len: socklen_t = 8;
    let conn = unsafe {
        cong_preload::accept4(
            listener.as_raw_fd(),
            (&mut storage as *mut sockaddr_storage).cast::<sockaddr>(),
            &mut len,
            0,
        )
    };
    assert!(conn >= 0, "accept4: {}", std::io::Error::last_os_error());
    assert_eq!(len as usize, mem::size_of::<sockaddr_in>());
    assert_eq!(congestion_of(conn), default_algo);

    unsafe {
        libc::close(conn);
        libc::close(client);
    }
}

#[test]
fn failed_connect_returns_error_untouched() {
    config();
    // Bind a listener and drop it so the port is (briefly) known-closed.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let sin = sockaddr_of(addr);

    let fd = tcp_socket();
    let res = hook_connect(fd, &sin);
    let err = std::io::Error::last_os_error();
    assert_eq!(res, -1);
    assert_eq!(err.raw_os_error(), Some(libc::ECONNREFUSED));

    unsafe { libc::close(fd) };
}

#[test]
fn nonblocking_connect_keeps_einprogress_and_applies_rule() {
    config();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let sin = sockaddr_of(listener.local_addr().unwrap());

    let fd = tcp_socket();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    assert_eq!(unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) }, 0);

    let res = hook_connect(fd, &sin);
    if res == -1 {
        // The expected path: in progress, errno preserved, rule applied.
        assert_eq!(std::io::Error::last_os_error().raw_os_error(), Some(libc::EINPROGRESS));
    }
    assert_eq!(congestion_of(fd), "cubic");

    unsafe { libc::close(fd) };
}
