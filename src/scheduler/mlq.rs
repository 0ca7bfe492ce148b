use log::{debug, trace};

use super::{LEVELS, Level, Scheduler};
use crate::core::{JobNum, KernelCtx, Ticks};

/// Five fixed levels. A job's level is chosen once, when it enters core,
/// from its requested burst; within a level, jobs run in queue order.
pub struct MultilevelScheduler {
    quanta: [Ticks; LEVELS],
}

impl MultilevelScheduler {
    /// First level whose quantum exceeds the burst; FCFS otherwise.
    pub fn classify(&self, burst: Ticks) -> Level {
        Level::all()
            .take(LEVELS - 1)
            .find(|level| burst < self.quanta[level.index()])
            .unwrap_or(Level::FCFS)
    }

    pub fn level_quantum(&self, level: Level) -> Ticks {
        self.quanta[level.index()]
    }
}

impl Scheduler for MultilevelScheduler {
    fn init(ctx: &mut KernelCtx) -> Self {
        Self {
            quanta: ctx.config.quanta,
        }
    }

    fn enqueue(&mut self, ctx: &mut KernelCtx, num: JobNum) {
        let Some(job) = ctx.job_mut(num) else {
            return;
        };
        let level = self.classify(job.max_cpu);
        job.level = Some(level);
        ctx.ready.push_back(level, num);
        debug!("job {num} ready at level {}", level.get());
    }

    fn select(&mut self, ctx: &mut KernelCtx) -> Option<JobNum> {
        let level = ctx.ready.first_non_empty()?;
        let head = ctx.ready.front(level)?;
        if ctx.job(head).is_some_and(|job| job.dispatchable()) {
            return Some(head);
        }

        trace!("head job {head} of level {} cannot run; rotating", level.get());
        ctx.ready.rotate(level);
        ctx.ready
            .iter()
            .map(|(_, num)| num)
            .find(|&num| ctx.job(num).is_some_and(|job| job.dispatchable()))
    }

    fn quantum(&self, ctx: &KernelCtx, num: JobNum) -> Ticks {
        let level = ctx
            .job(num)
            .and_then(|job| job.level)
            .unwrap_or(Level::FCFS);
        self.level_quantum(level)
    }
}
