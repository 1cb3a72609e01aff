//! The process-wide rule store.

use std::sync::OnceLock;

use cong_rules::RuleStore;

static STORE: OnceLock<RuleStore> = OnceLock::new();

/// The shared rule store, created from the environment on first use and
/// released implicitly at process exit.
pub(crate) fn get() -> &'static RuleStore {
    STORE.get_or_init(RuleStore::from_env)
}
