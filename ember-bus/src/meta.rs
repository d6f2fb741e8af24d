use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use uuid::Uuid;

/// Deduplication identity of a bus message (§3 "Fingerprint / key").
///
/// Commands and queries should always use [`MsgKey::unique`] so they are
/// never suppressed. Events may deliberately share a key across dispatches
/// to coalesce duplicate traffic (e.g. an unchanged bar re-broadcast by the
/// websocket feed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct MsgKey(SmolStr);

impl MsgKey {
    /// A key that is never shared — guarantees this message can never be
    /// suppressed by deduplication.
    pub fn unique() -> Self {
        Self(SmolStr::new(Uuid::new_v4().to_string()))
    }

    /// A key callers supply to deliberately coalesce repeated events.
    pub fn shared(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for MsgKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies which bus worker a message is routed to. Messages sharing a
/// `GroupKey` hash to the same worker and are therefore processed strictly
/// in FIFO order relative to each other (§5 "Messages targeted at the same
/// `(symbol, timeframe)` hash to the same worker").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct GroupKey(SmolStr);

impl GroupKey {
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self(key.into())
    }

    pub(crate) fn worker_index(&self, num_workers: usize) -> usize {
        use std::hash::{Hash, Hasher};
        let mut hasher = fnv::FnvHasher::default();
        self.0.hash(&mut hasher);
        (hasher.finish() as usize) % num_workers.max(1)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Header every [`Event`](crate::Event), [`Command`](crate::Command) and
/// [`Query`](crate::Query) carries (§3).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Meta {
    /// Lower value is scheduled sooner within a worker.
    pub priority: i32,
    pub group: GroupKey,
    pub key: MsgKey,
}

impl Meta {
    pub fn new(priority: i32, group: GroupKey, key: MsgKey) -> Self {
        Self {
            priority,
            group,
            key,
        }
    }
}

/// Priority reserved for the poison message that drains and stops a worker
/// (§4.1 "stop() — shuts down in an orderly manner... poison EventEnded").
/// Lower-numbered (more urgent) work already queued is always processed
/// first so the worker drains in-flight work before exiting.
pub const POISON_PRIORITY: i32 = i32::MAX;
