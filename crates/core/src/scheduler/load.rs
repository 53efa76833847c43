//! Live system load sampling.

use sysinfo::System;

/// A fresh reading of system load. Never cached: a stale sample would
/// over- or under-subscribe the host.
#[derive(Debug, Clone, Copy)]
pub struct LoadSample {
    /// One-minute load average.
    pub load_one: f64,
    /// Logical core count.
    pub cores: usize,
}

impl LoadSample {
    /// Whether the host is too loaded to take on more workers.
    pub fn is_saturated(&self) -> bool {
        self.load_one >= (self.cores.saturating_sub(1)) as f64
    }

    /// Cores not currently claimed by the load average.
    pub fn available_capacity(&self) -> usize {
        self.cores.saturating_sub(self.load_one.ceil() as usize)
    }
}

/// Source of load samples. The production implementation reads the host;
/// tests script a sequence of samples.
pub trait LoadProbe: Send + Sync {
    fn sample(&self) -> LoadSample;
}

/// Samples the host via the OS load average and logical core count.
#[derive(Debug, Default, Clone)]
pub struct SystemLoadProbe;

impl LoadProbe for SystemLoadProbe {
    fn sample(&self) -> LoadSample {
        LoadSample {
            load_one: System::load_average().one,
            cores: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1),
        }
    }
}
