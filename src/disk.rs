//! The single disk channel and the queue of jobs waiting on it.
//!
//! Requests are queued in arrival order. Whenever the channel frees up, the
//! waiting in-core job with the least CPU time remaining goes next; on a tie
//! the most recent of the tied requests wins. The queue itself is never
//! reordered.
//!
//! A job is latched from the moment it queues a request until one of its
//! transfers completes, and again whenever its transfer is started.

use std::collections::VecDeque;

use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::core::{JobNum, KernelCtx, Pcb, Termination};

#[derive(Debug, Clone, Default)]
pub struct IoQueue {
    jobs: VecDeque<JobNum>,
}

impl IoQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, job: JobNum) {
        self.jobs.push_back(job);
    }

    /// Removes the oldest request made by `job`.
    pub fn remove_first(&mut self, job: JobNum) -> bool {
        match self.jobs.iter().position(|&queued| queued == job) {
            Some(idx) => self.jobs.remove(idx).is_some(),
            None => false,
        }
    }

    pub fn count(&self, job: JobNum) -> usize {
        self.jobs.iter().filter(|&&queued| queued == job).count()
    }

    pub fn contains(&self, job: JobNum) -> bool {
        self.jobs.contains(&job)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = JobNum> + '_ {
        self.jobs.iter().copied()
    }

    /// Shortest-remaining-time choice among queued jobs that are in core.
    /// Ties go to the latest request.
    pub fn select_next(&self, jobs: &FxHashMap<JobNum, Pcb>) -> Option<JobNum> {
        self.jobs
            .iter()
            .rev()
            .filter_map(|num| jobs.get(num))
            .filter(|job| job.in_core())
            .min_by_key(|job| job.time_remaining)
            .map(|job| job.num)
    }
}

/// Queues a disk request on behalf of `num`, starting it at once if the
/// channel is idle.
pub fn start_io(ctx: &mut KernelCtx, num: JobNum) {
    let Some(job) = ctx.job_mut(num) else {
        warn!("I/O requested for unknown job {num}");
        return;
    };
    job.latched = true;
    job.pending_io += 1;
    ctx.io_queue.push_back(num);
    debug!("job {num} queued for disk ({} waiting)", ctx.io_queue.len());
    kick(ctx);
}

/// Starts the next transfer if nothing is in flight.
pub fn kick(ctx: &mut KernelCtx) {
    if ctx.active_io.is_some() {
        return;
    }
    let Some(next) = ctx.io_queue.select_next(&ctx.jobs) else {
        return;
    };
    if let Some(job) = ctx.job_mut(next) {
        job.latched = true;
    }
    ctx.active_io = Some(next);
    debug!("disk transfer started for job {next}");
    ctx.request_disk(next);
}

/// Retires the in-flight transfer and moves the channel on to the next
/// waiter. Returns the job whose transfer finished.
pub fn complete_transfer(ctx: &mut KernelCtx) -> Option<JobNum> {
    let Some(num) = ctx.active_io.take() else {
        warn!("disk interrupt with no transfer in flight");
        return None;
    };
    ctx.io_queue.remove_first(num);

    let Some(job) = ctx.job_mut(num) else {
        warn!("disk transfer finished for unknown job {num}");
        kick(ctx);
        return None;
    };
    job.pending_io = job.pending_io.saturating_sub(1);
    job.latched = false;
    let drained = job.pending_io == 0;

    kick(ctx);

    if drained {
        let terminate = ctx.job_mut(num).is_some_and(|job| {
            job.blocked = false;
            job.terminate_pending
        });
        if ctx.swap_candidate == Some(num) {
            ctx.swap_candidate = None;
        }
        if terminate && ctx.terminate(num) == Termination::Removed {
            debug!("deferred termination of job {num} completed");
        }
    }
    Some(num)
}
