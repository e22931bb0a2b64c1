//! Live-data synchronisation: coalescing cache, view store, pollers and the
//! metrics history buffer.

pub mod coalesce;
pub mod history;
pub mod poller;
pub mod store;

pub use coalesce::{CoalescingCache, SharedCoalescingCache};
pub use history::{History, MetricSample, DEFAULT_HISTORY_CAPACITY};
pub use poller::{
    CommitGate, Endpoint, Poller, PollerConfig, PollerHandle, PollerState, Refresher,
    RoundOutcome, ViewSource, DEFAULT_MIN_COMMIT_INTERVAL, MIN_REFRESH_INTERVAL,
};
pub use store::{CachedView, SharedViewStore, ViewStore};
