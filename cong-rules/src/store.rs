use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{Algorithm, CallKind, RuleSet};

/// Rule file consulted when no override is set.
pub const DEFAULT_CFG: &str = "/etc/tcpcong.cfg";

/// Environment variable naming an alternate rule file.
pub const CFG_ENV: &str = "TCPCONG_CFG";

/// Provenance of the active snapshot, guarded by the reload mutex.
#[derive(Debug, Default)]
struct SourceState {
    /// Modification time of the last observed source. `None` until the
    /// first stat and while the source cannot be stat'd, so a source that
    /// reappears always triggers a reload. A source that stats fine but
    /// cannot be read or parsed keeps its mtime recorded and is not retried
    /// until it changes.
    mtime: Option<SystemTime>,
    /// Set while the source is unreadable; the condition is logged once per
    /// transition, not on every query.
    unreadable: bool,
}

/// A lazily reloading, concurrently queryable rule store.
///
/// Every query stats the source file and reloads it when the modification
/// time changed. The active [`RuleSet`] is an immutable snapshot behind an
/// atomic handle: a reload either installs a fully parsed replacement or
/// leaves the previous snapshot untouched. Reloads serialize on a mutex;
/// queries that find the mutex taken skip the freshness check and read the
/// already-published snapshot instead of blocking.
#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    active: ArcSwapOption<RuleSet>,
    source: Mutex<SourceState>,
}

impl RuleStore {
    /// Creates a store backed by `path`. Nothing is read until the first
    /// query.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            active: ArcSwapOption::from(None),
            source: Mutex::new(SourceState::default()),
        }
    }

    /// Creates a store reading the path named by `TCPCONG_CFG`, falling
    /// back to the system default. The variable is consulted once, here.
    pub fn from_env() -> Self {
        match std::env::var_os(CFG_ENV) {
            Some(path) => Self::new(PathBuf::from(path)),
            None => Self::new(DEFAULT_CFG),
        }
    }

    /// The rule source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the algorithm configured for this call and peer, if any.
    pub fn lookup(&self, call: CallKind, peer: IpAddr) -> Option<Algorithm> {
        self.refresh();
        self.active.load().as_ref().and_then(|set| set.lookup(call, peer))
    }

    /// Reloads the source if its modification time changed since the last
    /// attempt. Returns without blocking when another thread is already
    /// inside; that thread will publish any fresher snapshot.
    fn refresh(&self) {
        let Some(mut state) = self.source.try_lock() else {
            return;
        };

        let mtime = match fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(mtime) => mtime,
            Err(err) => {
                if !state.unreadable {
                    warn!(path = %self.path.display(), %err, "rule source unreadable");
                    state.unreadable = true;
                }
                state.mtime = None;
                return;
            }
        };

        if state.mtime == Some(mtime) {
            return;
        }
        // Record the mtime before reading or parsing: a source that cannot
        // be read or that fails to parse is reported once per change, not
        // once per query.
        state.mtime = Some(mtime);

        let text = match fs::read_to_string(&self.path) {
            Ok(text) => {
                state.unreadable = false;
                text
            }
            Err(err) => {
                if !state.unreadable {
                    warn!(path = %self.path.display(), %err, "rule source unreadable");
                    state.unreadable = true;
                }
                return;
            }
        };

        match RuleSet::parse(&text) {
            Ok(set) => {
                debug!(path = %self.path.display(), rules = set.len(), "rule set installed");
                self.active.store(Some(Arc::new(set)));
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "rule reload rejected, keeping previous set");
            }
        }
    }
}
