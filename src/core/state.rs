use log::{debug, warn};
use rustc_hash::FxHashMap;

use super::event::{Arrival, Direction, KernelEvent};
use crate::config::Config;
use crate::disk::IoQueue;
use crate::memory::{DrumQueue, Extent, FreeSpaceTable};
use crate::scheduler::{Level, ReadyQueues};

pub type JobNum = u64;
pub type Ticks = u64;
/// Core sizes, in K words.
pub type Words = u64;
pub type Address = u64;

/// Process record for one admitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcb {
    pub num: JobNum,
    pub priority: u32,
    pub size: Words,
    /// Total CPU burst requested at arrival.
    pub max_cpu: Ticks,
    pub time_remaining: Ticks,
    /// Base of the job's core region; `None` while it lives on the drum.
    pub address: Option<Address>,
    /// Bookkeeping anchor for the current chargeable interval.
    pub interval_start: Ticks,
    /// Quantum granted by the most recent dispatch.
    pub slice: Ticks,
    /// A full slice that ran out exactly as an interrupt arrived, not yet
    /// deducted from `time_remaining`.
    pub deferred_charge: Ticks,
    pub pending_io: u32,
    pub level: Option<Level>,
    pub blocked: bool,
    /// Set when the job queues a disk request or its transfer starts;
    /// cleared when one of its transfers completes.
    pub latched: bool,
    pub running: bool,
    pub terminate_pending: bool,
}

impl Pcb {
    pub fn new(arrival: &Arrival) -> Self {
        Self {
            num: arrival.job,
            priority: arrival.priority,
            size: arrival.size,
            max_cpu: arrival.max_cpu,
            time_remaining: arrival.max_cpu,
            address: None,
            interval_start: arrival.time,
            slice: 0,
            deferred_charge: 0,
            pending_io: 0,
            level: None,
            blocked: false,
            latched: false,
            running: false,
            terminate_pending: false,
        }
    }

    pub fn in_core(&self) -> bool {
        self.address.is_some()
    }

    /// Eligible to be handed the CPU.
    pub fn dispatchable(&self) -> bool {
        self.in_core() && !self.blocked && !self.terminate_pending
    }

    pub fn charge(&mut self, elapsed: Ticks) {
        self.time_remaining = self.time_remaining.saturating_sub(elapsed);
    }

    pub fn extent(&self) -> Option<Extent> {
        self.address.map(|address| Extent {
            size: self.size,
            address,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Removed,
    Deferred,
    Unknown,
}

/// All mutable kernel state, bundled so every handler works on one value.
#[derive(Debug)]
pub struct KernelCtx {
    pub now: Ticks,
    pub config: Config,
    pub jobs: FxHashMap<JobNum, Pcb>,
    pub free_space: FreeSpaceTable,
    pub drum_queue: DrumQueue,
    pub io_queue: IoQueue,
    pub ready: ReadyQueues,
    pub drum_busy: bool,
    pub running: Option<JobNum>,
    /// Job whose drum transfer (either direction) is in flight.
    pub swapping: Option<JobNum>,
    /// Job whose disk transfer is in flight.
    pub active_io: Option<JobNum>,
    pub swap_candidate: Option<JobNum>,

    outbox: Vec<KernelEvent>,
}

impl KernelCtx {
    pub fn new(config: Config) -> Self {
        Self {
            now: 0,
            free_space: FreeSpaceTable::new(config.core_size),
            config,
            jobs: FxHashMap::default(),
            drum_queue: DrumQueue::new(),
            io_queue: IoQueue::new(),
            ready: ReadyQueues::new(),
            drum_busy: false,
            running: None,
            swapping: None,
            active_io: None,
            swap_candidate: None,
            outbox: Vec::new(),
        }
    }

    pub fn job(&self, num: JobNum) -> Option<&Pcb> {
        self.jobs.get(&num)
    }

    pub fn job_mut(&mut self, num: JobNum) -> Option<&mut Pcb> {
        self.jobs.get_mut(&num)
    }

    /// Registers a newly arrived job. Returns false when the arrival has to
    /// be turned away.
    pub fn admit(&mut self, arrival: &Arrival) -> bool {
        if self.jobs.contains_key(&arrival.job) {
            warn!("job {} arrived while already live; ignoring", arrival.job);
            self.emit(KernelEvent::ArrivalRejected {
                job: arrival.job,
                size: arrival.size,
            });
            return false;
        }
        if arrival.size > self.config.core_size {
            warn!(
                "job {} needs {}K but core is only {}K; rejecting",
                arrival.job, arrival.size, self.config.core_size
            );
            self.emit(KernelEvent::ArrivalRejected {
                job: arrival.job,
                size: arrival.size,
            });
            return false;
        }

        self.jobs.insert(arrival.job, Pcb::new(arrival));
        self.drum_queue.push_back(arrival.job, arrival.size);
        true
    }

    pub fn core_in_use(&self) -> Words {
        self.jobs
            .values()
            .filter(|job| job.in_core())
            .map(|job| job.size)
            .sum()
    }

    /// Tears a job down, or marks it for teardown once its disk or drum
    /// activity clears.
    ///
    /// A job with queued requests is deferred even when neither blocked nor
    /// latched, since each queued entry still names it.
    pub fn terminate(&mut self, num: JobNum) -> Termination {
        let Some(job) = self.jobs.get_mut(&num) else {
            warn!("terminate: job {num} is not in the directory");
            return Termination::Unknown;
        };

        let owed = std::mem::take(&mut job.deferred_charge);
        job.charge(owed);
        job.running = false;
        self.ready.remove(num);
        if self.running == Some(num) {
            self.running = None;
        }

        if job.blocked || job.latched || job.pending_io > 0 {
            job.terminate_pending = true;
            debug!(
                "job {num} termination deferred (blocked={}, latched={}, pending_io={})",
                job.blocked, job.latched, job.pending_io
            );
            return Termination::Deferred;
        }

        let Some(job) = self.jobs.remove(&num) else {
            return Termination::Unknown;
        };
        if let Some(extent) = job.extent() {
            self.free_space.release(extent);
        }
        self.drum_queue.remove(num);
        if self.swap_candidate == Some(num) {
            self.swap_candidate = None;
        }
        debug!("job {num} terminated at t={}", self.now);
        self.emit(KernelEvent::JobTerminated { job: num });
        Termination::Removed
    }

    pub fn request_disk(&mut self, job: JobNum) {
        self.emit(KernelEvent::DiskTransfer { job });
    }

    pub fn request_drum(&mut self, job: JobNum, size: Words, address: Address, direction: Direction) {
        self.emit(KernelEvent::DrumTransfer {
            job,
            size,
            address,
            direction,
        });
    }

    pub fn emit(&mut self, event: KernelEvent) {
        self.outbox.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<KernelEvent> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival(job: JobNum, size: Words, max_cpu: Ticks) -> Arrival {
        Arrival {
            job,
            priority: 1,
            size,
            max_cpu,
            time: 0,
        }
    }

    /// Places a job straight into core at `address` without going through the drum.
    fn resident(ctx: &mut KernelCtx, job: JobNum, size: Words) -> Address {
        assert!(ctx.admit(&arrival(job, size, 1000)));
        ctx.drum_queue.remove(job);
        let address = ctx.free_space.allocate(size).unwrap();
        let pcb = ctx.job_mut(job).unwrap();
        pcb.address = Some(address);
        pcb.level = Level::new(1);
        ctx.ready.push_back(Level::new(1).unwrap(), job);
        address
    }

    #[test]
    fn new_record_starts_with_full_burst() {
        let pcb = Pcb::new(&arrival(7, 10, 4200));
        assert_eq!(pcb.time_remaining, 4200);
        assert_eq!(pcb.address, None);
        assert!(!pcb.in_core());
        assert!(!pcb.blocked && !pcb.latched && !pcb.running && !pcb.terminate_pending);
    }

    #[test]
    fn charge_never_underflows() {
        let mut pcb = Pcb::new(&arrival(1, 10, 100));
        pcb.charge(40);
        assert_eq!(pcb.time_remaining, 60);
        pcb.charge(500);
        assert_eq!(pcb.time_remaining, 0);
    }

    #[test]
    fn admit_rejects_oversized_and_duplicate_jobs() {
        let mut ctx = KernelCtx::new(Config::default());
        assert!(!ctx.admit(&arrival(1, 101, 10)));
        assert!(ctx.admit(&arrival(2, 100, 10)));
        assert!(!ctx.admit(&arrival(2, 5, 10)));
        assert_eq!(ctx.jobs.len(), 1);
        assert_eq!(ctx.drum_queue.len(), 1);
        let rejected = ctx
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, KernelEvent::ArrivalRejected { .. }))
            .count();
        assert_eq!(rejected, 2);
    }

    #[test]
    fn terminate_idle_job_frees_memory() {
        let mut ctx = KernelCtx::new(Config::default());
        resident(&mut ctx, 1, 40);
        resident(&mut ctx, 2, 20);

        assert_eq!(ctx.terminate(1), Termination::Removed);
        assert!(ctx.job(1).is_none());
        assert!(!ctx.ready.contains(1));
        assert_eq!(
            ctx.free_space.extents(),
            &[
                Extent { size: 40, address: 60 },
                Extent { size: 40, address: 0 }
            ]
        );
        assert_eq!(ctx.drain_events(), vec![KernelEvent::JobTerminated { job: 1 }]);
    }

    #[test]
    fn terminate_with_pending_io_is_deferred() {
        let mut ctx = KernelCtx::new(Config::default());
        resident(&mut ctx, 3, 10);
        {
            let job = ctx.job_mut(3).unwrap();
            job.pending_io = 2;
            job.blocked = true;
        }

        assert_eq!(ctx.terminate(3), Termination::Deferred);
        let job = ctx.job(3).unwrap();
        assert!(job.terminate_pending);
        assert!(job.in_core());
        assert!(!ctx.ready.contains(3));
        assert_eq!(ctx.free_space.total(), 90);
    }

    #[test]
    fn queued_request_alone_defers_termination() {
        let mut ctx = KernelCtx::new(Config::default());
        resident(&mut ctx, 4, 10);
        ctx.job_mut(4).unwrap().pending_io = 1;

        assert_eq!(ctx.terminate(4), Termination::Deferred);
        let job = ctx.job(4).unwrap();
        assert!(!job.blocked && !job.latched);
        assert!(job.terminate_pending);
    }

    #[test]
    fn terminate_settles_parked_slice() {
        let mut ctx = KernelCtx::new(Config::default());
        resident(&mut ctx, 5, 10);
        {
            let job = ctx.job_mut(5).unwrap();
            job.pending_io = 1;
            job.deferred_charge = 400;
        }

        assert_eq!(ctx.terminate(5), Termination::Deferred);
        let job = ctx.job(5).unwrap();
        assert_eq!(job.time_remaining, 600);
        assert_eq!(job.deferred_charge, 0);
    }

    #[test]
    fn terminate_unknown_job_is_a_no_op() {
        let mut ctx = KernelCtx::new(Config::default());
        assert_eq!(ctx.terminate(99), Termination::Unknown);
        assert!(ctx.drain_events().is_empty());
    }
}
