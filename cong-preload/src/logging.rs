//! Diagnostics for the interposed process.
//!
//! The host application never initializes us, so a stderr subscriber is
//! installed lazily on the first intercepted call. Warnings are always
//! emitted; setting `TCPCONG_DEBUG` raises the level to debug. If the host
//! already installed a global subscriber, ours quietly steps aside and its
//! sinks receive our events instead.

use std::sync::Once;

use tracing::Level;

/// Environment variable enabling debug-level diagnostics.
pub(crate) const DEBUG_ENV: &str = "TCPCONG_DEBUG";

static INIT: Once = Once::new();

pub(crate) fn init() {
    INIT.call_once(|| {
        let level = if std::env::var_os(DEBUG_ENV).is_some() {
            Level::DEBUG
        } else {
            Level::WARN
        };
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
