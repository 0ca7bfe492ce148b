use log::{debug, trace, warn};

use super::{
    event::{Arrival, CpuAction, Event, KernelEvent, SvcOp},
    observer::Observer,
    state::{JobNum, KernelCtx, Ticks},
};
use crate::config::{Config, ConfigError};
use crate::disk;
use crate::memory;
use crate::scheduler::Scheduler;

/// What the bookkeeper did with the running job's interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// Nothing chargeable was running.
    Idle,
    Charged(Ticks),
    /// Exactly one granted quantum elapsed. The charge is parked on the job
    /// for the timer handler, or settled before the next dispatch.
    DeferredToTimer,
}

/// The five interrupt handlers and the state they share.
///
/// Every handler runs the same pipeline: bookkeeping, the event's own state
/// change, a memory-manager pass, then dispatch.
pub struct Kernel<S: Scheduler> {
    pub ctx: KernelCtx,
    pub scheduler: S,
    observer: Observer,
}

impl<S: Scheduler> Kernel<S> {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut ctx = KernelCtx::new(config);
        let scheduler = S::init(&mut ctx);
        Ok(Self {
            ctx,
            scheduler,
            observer: Observer::new(),
        })
    }

    pub fn handle(&mut self, event: Event) -> CpuAction {
        match event {
            Event::Arrival(arrival) => self.on_arrival(arrival),
            Event::DiskComplete { time } => self.on_disk_complete(time),
            Event::DrumComplete { time } => self.on_drum_complete(time),
            Event::TimerExpired { time } => self.on_timer_expired(time),
            Event::Svc { op, time } => self.on_svc(op, time),
        }
    }

    pub fn on_arrival(&mut self, arrival: Arrival) -> CpuAction {
        trace!("t={} arrival of job {}", arrival.time, arrival.job);
        self.book_keep(arrival.time);
        if self.ctx.admit(&arrival) {
            debug!(
                "job {} admitted to drum ({}K, burst {})",
                arrival.job, arrival.size, arrival.max_cpu
            );
        }
        self.finish()
    }

    pub fn on_disk_complete(&mut self, time: Ticks) -> CpuAction {
        trace!("t={time} disk interrupt");
        self.book_keep(time);
        disk::complete_transfer(&mut self.ctx);
        self.finish()
    }

    pub fn on_drum_complete(&mut self, time: Ticks) -> CpuAction {
        trace!("t={time} drum interrupt");
        self.book_keep(time);
        self.ctx.drum_busy = false;
        self.ctx.drum_queue.sort_by_size();

        match self.ctx.swapping.take() {
            Some(num) => {
                let state = self
                    .ctx
                    .job(num)
                    .map(|job| (job.in_core(), job.terminate_pending));
                match state {
                    Some((true, false)) => self.scheduler.enqueue(&mut self.ctx, num),
                    Some((true, true)) => {
                        debug!("job {num} swapped in while terminate-pending; not readied")
                    }
                    Some((false, _)) => debug!("job {num} swapped out to drum"),
                    None => warn!("drum transfer finished for unknown job {num}"),
                }
            }
            None => warn!("drum interrupt with no transfer in flight"),
        }
        // A job just brought in may have disk requests waiting on it.
        disk::kick(&mut self.ctx);
        self.finish()
    }

    pub fn on_timer_expired(&mut self, time: Ticks) -> CpuAction {
        trace!("t={time} quantum expired");
        let charge = self.book_keep(time);
        let Some(num) = self.ctx.running else {
            warn!("timer expired with no job running");
            return self.finish();
        };

        let exhausted = match self.ctx.job_mut(num) {
            Some(job) if charge != Charge::Idle => {
                let owed = std::mem::take(&mut job.deferred_charge);
                job.charge(owed);
                job.time_remaining == 0
            }
            _ => false,
        };
        if exhausted {
            debug!("job {num} exhausted its burst");
            self.ctx.terminate(num);
        }
        self.finish()
    }

    pub fn on_svc(&mut self, op: SvcOp, time: Ticks) -> CpuAction {
        trace!("t={time} software interrupt {op:?}");
        self.book_keep(time);
        let Some(num) = self.ctx.running else {
            warn!("software interrupt {op:?} with no job running");
            return self.finish();
        };

        match op {
            SvcOp::Terminate => {
                self.ctx.terminate(num);
            }
            SvcOp::RequestIo => disk::start_io(&mut self.ctx, num),
            SvcOp::Block => self.block(num),
        }
        self.finish()
    }

    fn block(&mut self, num: JobNum) {
        let swap = self.ctx.config.swap;
        let Some(job) = self.ctx.job_mut(num) else {
            return;
        };
        if job.pending_io == 0 {
            return;
        }
        job.blocked = true;
        let pending = job.pending_io;
        let eligible = swap.eligible(job);
        if eligible {
            self.ctx.swap_candidate = Some(num);
        }
        debug!("job {num} blocked on {pending} request(s), swappable={eligible}");
    }

    /// Charges the running job for CPU used since its interval began.
    pub fn book_keep(&mut self, now: Ticks) -> Charge {
        self.ctx.now = now;
        let Some(num) = self.ctx.running else {
            return Charge::Idle;
        };
        let Some(job) = self.ctx.job_mut(num) else {
            self.ctx.running = None;
            return Charge::Idle;
        };
        if !job.running || job.blocked || job.terminate_pending {
            job.interval_start = now;
            return Charge::Idle;
        }

        let elapsed = now.saturating_sub(job.interval_start);
        if elapsed == job.slice {
            job.deferred_charge = elapsed;
            job.interval_start = now;
            return Charge::DeferredToTimer;
        }
        job.charge(elapsed);
        job.interval_start = now;
        trace!("job {num} charged {elapsed}, {} left", job.time_remaining);
        Charge::Charged(elapsed)
    }

    fn finish(&mut self) -> CpuAction {
        self.settle_deferred();
        memory::run_pass(&mut self.ctx);
        let action = self.dispatch();
        self.observer.observe(&self.ctx);
        action
    }

    /// Deducts a slice that expired exactly as a non-timer interrupt came
    /// in. The job may be re-dispatched before its timer is delivered, so
    /// the charge cannot wait for the timer handler.
    fn settle_deferred(&mut self) {
        let Some(num) = self.ctx.running else {
            return;
        };
        let Some(job) = self.ctx.job_mut(num) else {
            return;
        };
        if job.deferred_charge == 0 {
            return;
        }
        let owed = std::mem::take(&mut job.deferred_charge);
        job.charge(owed);
        let exhausted = job.time_remaining == 0;
        debug!("job {num} charged its full slice of {owed} on a boundary interrupt");
        if exhausted {
            debug!("job {num} exhausted its burst");
            self.ctx.terminate(num);
        }
    }

    /// Hands the CPU to the scheduler's choice, or idles it.
    pub fn dispatch(&mut self) -> CpuAction {
        let next = self.scheduler.select(&mut self.ctx);
        if let Some(prev) = self.ctx.running.filter(|&prev| Some(prev) != next) {
            if let Some(job) = self.ctx.job_mut(prev) {
                job.running = false;
            }
        }

        let Some(num) = next else {
            self.ctx.running = None;
            return CpuAction::Idle;
        };
        let full = self.scheduler.quantum(&self.ctx, num);
        let now = self.ctx.now;
        let Some(job) = self.ctx.job_mut(num) else {
            self.ctx.running = None;
            return CpuAction::Idle;
        };
        let Some(address) = job.address else {
            warn!("scheduler picked job {num}, which is not in core");
            self.ctx.running = None;
            return CpuAction::Idle;
        };

        let quantum = job.time_remaining.min(full);
        job.slice = quantum;
        job.interval_start = now;
        job.running = true;
        let size = job.size;
        self.ctx.running = Some(num);
        trace!("dispatching job {num} for {quantum}");
        CpuAction::Run {
            job: num,
            address,
            size,
            quantum,
        }
    }

    pub fn drain_events(&mut self) -> Vec<KernelEvent> {
        self.ctx.drain_events()
    }

    pub fn now(&self) -> Ticks {
        self.ctx.now
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }
}
