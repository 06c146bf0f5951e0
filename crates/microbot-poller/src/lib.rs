pub mod poller;

pub use poller::{Poller, PollerConfig, PollerHandle, PollerStats, DEFAULT_POLL_INTERVAL};
