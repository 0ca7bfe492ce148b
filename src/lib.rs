pub mod config;
pub mod core;
pub mod disk;
pub mod memory;
pub mod scheduler;
pub mod sim;

pub use config::{Config, ConfigError, SwapPolicy};
pub use core::{CpuAction, Event, Kernel, KernelEvent};
pub use scheduler::{MultilevelScheduler, Scheduler};
pub use sim::{Job, Sim, SimError, Timing};
