//! Congestion-control rule parsing, storage and lookup.
//!
//! A rule file associates intercepted calls and peer address ranges with a
//! congestion-control algorithm, one rule per line:
//!
//! ```text
//! # broad default, then exceptions: the last matching line wins.
//! connect: 0.0.0.0/0: cubic
//! connect: 10.0.0.0/8: bbr
//! accept: [2001:db8::]/32: reno
//! ```
//!
//! [`RuleSet`] is an immutable parsed snapshot; [`RuleStore`] keeps the
//! active snapshot fresh against the file's modification time and is safe
//! to query from any number of threads.

mod rule;
mod store;

pub use rule::{Algorithm, CallKind, ParseError, Rule, RuleSet};
pub use store::{RuleStore, CFG_ENV, DEFAULT_CFG};
