//! Transparent TCP congestion-control selection for unmodified applications.
//!
//! Built as a `cdylib` and injected with `LD_PRELOAD`, this library shadows
//! `connect(2)`, `accept(2)` and `accept4(2)`. Each entry point forwards to
//! the real routine (resolved once through `dlsym(RTLD_NEXT, ..)`), then
//! consults the rule store for the peer address and, on a match, sets the
//! `TCP_CONGESTION` socket option. The shadowed call's return value and
//! errno are preserved exactly; the option set is strictly best-effort.
//!
//! ```text
//! LD_PRELOAD=libcong_preload.so TCPCONG_CFG=./rules.cfg my_app
//! ```

mod accept;
mod connect;
mod errno;
mod logging;
mod peer;
mod real;
mod sockopt;
mod store;

pub use accept::{accept, accept4};
pub use connect::connect;
