//! Lazy resolution of the real libc routines this library shadows.
//!
//! The library exports the same symbols it needs to call, so the authentic
//! implementations can only be reached through the next object in the
//! dynamic symbol chain. Lookups are memoized per symbol: the slot is an
//! atomic pointer published with release ordering, and concurrent callers
//! either observe the finished resolution or redo a lookup that converges
//! on the same value.

use std::{
    ffi::c_void,
    mem,
    ptr,
    sync::atomic::{AtomicPtr, Ordering},
};

use libc::{c_int, sockaddr, socklen_t};

/// Signature of `connect(2)`.
pub(crate) type ConnectFn = unsafe extern "C" fn(c_int, *const sockaddr, socklen_t) -> c_int;

/// Signature of `accept(2)`.
pub(crate) type AcceptFn = unsafe extern "C" fn(c_int, *mut sockaddr, *mut socklen_t) -> c_int;

/// Signature of `accept4(2)`.
pub(crate) type Accept4Fn =
    unsafe extern "C" fn(c_int, *mut sockaddr, *mut socklen_t, c_int) -> c_int;

static REAL_CONNECT: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
static REAL_ACCEPT: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());
static REAL_ACCEPT4: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

/// Resolves `name` through `RTLD_NEXT`, publishing the address in `slot`.
/// Returns null if the symbol cannot be found; failure is not cached, so a
/// later call retries independently.
fn resolve(slot: &AtomicPtr<c_void>, name: &'static [u8]) -> *mut c_void {
    let cached = slot.load(Ordering::Acquire);
    if !cached.is_null() {
        return cached;
    }

    debug_assert_eq!(name.last(), Some(&0), "symbol name must be NUL-terminated");
    let found = unsafe { libc::dlsym(libc::RTLD_NEXT, name.as_ptr().cast()) };
    if !found.is_null() {
        slot.store(found, Ordering::Release);
    }
    found
}

pub(crate) fn connect() -> Option<ConnectFn> {
    let ptr = resolve(&REAL_CONNECT, b"connect\0");
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { mem::transmute::<*mut c_void, ConnectFn>(ptr) })
}

pub(crate) fn accept() -> Option<AcceptFn> {
    let ptr = resolve(&REAL_ACCEPT, b"accept\0");
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { mem::transmute::<*mut c_void, AcceptFn>(ptr) })
}

pub(crate) fn accept4() -> Option<Accept4Fn> {
    let ptr = resolve(&REAL_ACCEPT4, b"accept4\0");
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { mem::transmute::<*mut c_void, Accept4Fn>(ptr) })
}
