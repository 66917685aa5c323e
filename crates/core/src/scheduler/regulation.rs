//! Load-based auto-throttle: extra sleep between scheduler loops while the
//! host is busy.

use sysinfo::System;
use tracing::debug;

use crate::config::RegulationConfig;

/// CPU and memory usage in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

pub trait LoadSampler: Send {
    fn sample(&mut self) -> LoadSample;
}

/// Samples the host through sysinfo.
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        Self { system }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSampler for SysinfoSampler {
    fn sample(&mut self) -> LoadSample {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            (self.system.used_memory() as f64 / total as f64 * 100.0) as f32
        };
        LoadSample {
            cpu_percent: self.system.global_cpu_usage(),
            memory_percent,
        }
    }
}

pub struct LoadRegulator {
    config: RegulationConfig,
    sampler: Box<dyn LoadSampler>,
    extra_sleep: f64,
}

impl LoadRegulator {
    pub fn new(config: RegulationConfig, sampler: Box<dyn LoadSampler>) -> Self {
        Self {
            config,
            sampler,
            extra_sleep: 0.0,
        }
    }

    /// Current extra sleep in seconds.
    pub fn extra_sleep(&self) -> f64 {
        self.extra_sleep
    }

    /// Take a sample and step the extra sleep up or down. Returns the new value.
    pub fn observe(&mut self) -> f64 {
        if !self.config.enabled {
            self.extra_sleep = 0.0;
            return 0.0;
        }
        let sample = self.sampler.sample();
        let overloaded = sample.cpu_percent > self.config.cpu_threshold
            || sample.memory_percent > self.config.memory_threshold;
        let previous = self.extra_sleep;
        self.extra_sleep = if overloaded {
            (self.extra_sleep + self.config.increase_step_secs).min(self.config.max_sleep_secs)
        } else {
            (self.extra_sleep - self.config.decrease_step_secs).max(0.0)
        };
        if self.extra_sleep != previous {
            debug!(
                cpu = sample.cpu_percent,
                memory = sample.memory_percent,
                extra_sleep = self.extra_sleep,
                "Adjusted scheduler throttle"
            );
        }
        self.extra_sleep
    }
}
