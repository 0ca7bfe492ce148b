//! Kernel configuration.
//!
//! Every field has a default matching the classic 100K machine, so a JSON
//! document only needs to name what it overrides.

use serde::Deserialize;
use thiserror::Error;

use crate::core::{Pcb, Ticks, Words};
use crate::scheduler::LEVELS;

mod defaults {
    use crate::core::{Ticks, Words};
    use crate::scheduler::LEVELS;

    pub const CORE_SIZE: Words = 100;

    /// Levels 1-4 double as the classification thresholds; level 5 is FCFS.
    pub const QUANTA: [Ticks; LEVELS] = [1500, 2500, 3500, 4500, 6500];

    pub const SWAP_MIN_BURST: Ticks = 6500;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("core size must be non-zero")]
    ZeroCoreSize,
    #[error("quantum for level {level} must be non-zero")]
    ZeroQuantum { level: usize },
    #[error("quantum for level {level} ({quantum}) must exceed the level above it ({previous})")]
    UnorderedQuanta {
        level: usize,
        quantum: Ticks,
        previous: Ticks,
    },
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which blocked jobs the swapper may push back out to the drum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPolicy {
    Never,
    Always,
    /// Jobs whose requested burst is at least this long.
    BurstAtLeast(Ticks),
    /// Jobs occupying at least this much core.
    SizeAtLeast(Words),
}

impl Default for SwapPolicy {
    fn default() -> Self {
        Self::BurstAtLeast(defaults::SWAP_MIN_BURST)
    }
}

impl SwapPolicy {
    pub fn eligible(&self, job: &Pcb) -> bool {
        match *self {
            Self::Never => false,
            Self::Always => true,
            Self::BurstAtLeast(burst) => job.max_cpu >= burst,
            Self::SizeAtLeast(size) => job.size >= size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Total core, in K words.
    pub core_size: Words,
    /// Quantum per ready-queue level, level 1 first.
    pub quanta: [Ticks; LEVELS],
    pub swap: SwapPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core_size: defaults::CORE_SIZE,
            quanta: defaults::QUANTA,
            swap: SwapPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_size == 0 {
            return Err(ConfigError::ZeroCoreSize);
        }
        for (idx, &quantum) in self.quanta.iter().enumerate() {
            if quantum == 0 {
                return Err(ConfigError::ZeroQuantum { level: idx + 1 });
            }
            if idx > 0 && quantum <= self.quanta[idx - 1] {
                return Err(ConfigError::UnorderedQuanta {
                    level: idx + 1,
                    quantum,
                    previous: self.quanta[idx - 1],
                });
            }
        }
        Ok(())
    }
}
