//! Load-aware batch scheduling.
//!
//! Given a work list and a worker function, the scheduler measures live
//! system load, derives a safe worker count, partitions the list into
//! contiguous slices, fans the slices out, and aggregates per-worker result
//! maps through a bounded completion channel. The heavy work inside each
//! worker is expected to be an external engine child process, so the
//! workload itself runs with OS-process isolation; the scheduler owns only
//! the dispatch and aggregation plumbing.
//!
//! Two policies exist: the adaptive policy samples the load average before
//! every round and blocks (re-sampling on an interval) while the system is
//! saturated; the fixed policy uses a static worker count over small
//! sub-batches to bound peak memory.

mod config;
mod error;
mod load;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use load::{LoadProbe, LoadSample, SystemLoadProbe};
pub use scheduler::LoadAwareScheduler;
