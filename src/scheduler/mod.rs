pub mod mlq;
pub mod ready;

use crate::core::{JobNum, KernelCtx, Ticks};
pub use mlq::MultilevelScheduler;
pub use ready::ReadyQueues;

pub const LEVELS: usize = 5;

/// Ready-queue level, 1 (shortest quantum, most preferred) through 5 (FCFS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u8);

impl Level {
    pub const FIRST: Level = Level(1);
    pub const FCFS: Level = Level(LEVELS as u8);

    pub fn new(level: u8) -> Option<Self> {
        (1..=LEVELS as u8).contains(&level).then_some(Self(level))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0) - 1
    }

    pub fn all() -> impl Iterator<Item = Level> {
        (1..=LEVELS as u8).map(Level)
    }
}

pub trait Scheduler {
    fn init(ctx: &mut KernelCtx) -> Self;

    /// Called once a job has been brought into core.
    fn enqueue(&mut self, ctx: &mut KernelCtx, job: JobNum);

    /// Picks the job to run next. Never returns a blocked or
    /// terminate-pending job.
    fn select(&mut self, ctx: &mut KernelCtx) -> Option<JobNum>;

    /// Full quantum for the job's current level.
    fn quantum(&self, ctx: &KernelCtx, job: JobNum) -> Ticks;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_one_based() {
        assert_eq!(Level::new(0), None);
        assert_eq!(Level::new(6), None);
        assert_eq!(Level::new(1), Some(Level::FIRST));
        assert_eq!(Level::FCFS.index(), 4);
        assert_eq!(Level::all().map(Level::get).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }
}
