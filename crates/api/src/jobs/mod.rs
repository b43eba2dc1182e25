//! Background job scheduler and job implementations.

mod feed_reconcile;
mod offline_replay;
mod pool_metrics;
mod scheduler;

pub use feed_reconcile::FeedReconcileJob;
pub use offline_replay::OfflineReplayJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
