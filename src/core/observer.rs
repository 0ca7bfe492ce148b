use log::error;
use thiserror::Error;

use super::state::{JobNum, KernelCtx, Words};
use crate::scheduler::Level;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("free space {free}K + resident {resident}K != core {core}K")]
    Conservation {
        free: Words,
        resident: Words,
        core: Words,
    },
    #[error("free-space table holds adjacent extents after consolidation")]
    AdjacentFree,
    #[error("latched job {0} has no queued disk request")]
    LatchedWithoutRequest(JobNum),
    #[error("active disk job {0} is not latched or not queued")]
    ActiveNotLatched(JobNum),
    #[error("job {job} counts {pending} pending I/O but has {queued} queued")]
    PendingIo {
        job: JobNum,
        pending: u32,
        queued: usize,
    },
    #[error("I/O queue names unknown job {0}")]
    UnknownIoJob(JobNum),
    #[error("ready job {job} at level {level} is missing, out of core, terminating or misfiled")]
    BadReadyEntry { job: JobNum, level: u8 },
    #[error("running job {0} is not dispatchable")]
    RunningNotDispatchable(JobNum),
    #[error("{0} jobs flagged running")]
    MultipleRunning(usize),
    #[error("drum busy flag disagrees with in-flight transfer")]
    DrumFlag,
}

#[derive(Debug, Default)]
pub struct Observer {
    step: u64,
}

impl Observer {
    pub fn new() -> Self {
        Self { step: 0 }
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn observe(&mut self, ctx: &KernelCtx) {
        self.step += 1;
        if let Err(violation) = Self::check(ctx) {
            error!("step {} (t={}): {violation}", self.step, ctx.now);
            debug_assert!(false, "step {}: {violation}", self.step);
        }
    }

    /// Checks every structural invariant of the context, as it stands after
    /// a completed handler.
    pub fn check(ctx: &KernelCtx) -> Result<(), InvariantViolation> {
        let free = ctx.free_space.total();
        let resident = ctx.core_in_use();
        if free + resident != ctx.config.core_size {
            return Err(InvariantViolation::Conservation {
                free,
                resident,
                core: ctx.config.core_size,
            });
        }
        if ctx.free_space.has_adjacent() {
            return Err(InvariantViolation::AdjacentFree);
        }

        if let Some(job) = ctx.jobs.values().find(|job| job.latched && job.pending_io == 0) {
            return Err(InvariantViolation::LatchedWithoutRequest(job.num));
        }
        if let Some(num) = ctx.active_io {
            let latched = ctx.job(num).is_some_and(|job| job.latched);
            if !latched || !ctx.io_queue.contains(num) {
                return Err(InvariantViolation::ActiveNotLatched(num));
            }
        }

        for job in ctx.jobs.values() {
            let queued = ctx.io_queue.count(job.num);
            if queued != job.pending_io as usize {
                return Err(InvariantViolation::PendingIo {
                    job: job.num,
                    pending: job.pending_io,
                    queued,
                });
            }
        }
        if let Some(unknown) = ctx.io_queue.iter().find(|num| ctx.job(*num).is_none()) {
            return Err(InvariantViolation::UnknownIoJob(unknown));
        }

        for (level, num) in ctx.ready.iter() {
            let filed = ctx.job(num).is_some_and(|job| {
                job.in_core() && !job.terminate_pending && job.level == Some(level)
            });
            if !filed {
                return Err(bad_ready(num, level));
            }
        }

        let running = ctx.jobs.values().filter(|job| job.running).count();
        if running > 1 {
            return Err(InvariantViolation::MultipleRunning(running));
        }
        if let Some(num) = ctx.running {
            if !ctx.job(num).is_some_and(|job| job.dispatchable() && job.running) {
                return Err(InvariantViolation::RunningNotDispatchable(num));
            }
        }

        if ctx.drum_busy != ctx.swapping.is_some() {
            return Err(InvariantViolation::DrumFlag);
        }
        Ok(())
    }
}

fn bad_ready(job: JobNum, level: Level) -> InvariantViolation {
    InvariantViolation::BadReadyEntry {
        job,
        level: level.get(),
    }
}
