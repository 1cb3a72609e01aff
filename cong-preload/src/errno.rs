//! errno access around the interposed calls.
//!
//! The interposition must hand the application exactly the errno the real
//! call produced, and the probing and logging done for the side effect can
//! itself clobber errno, so hooks save and restore it explicitly.

use libc::c_int;

pub(crate) fn get() -> c_int {
    unsafe { *libc::__errno_location() }
}

pub(crate) fn set(value: c_int) {
    unsafe { *libc::__errno_location() = value };
}
