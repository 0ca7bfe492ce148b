use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

use super::job::{Job, JobInstance};
use crate::{
    config::{Config, ConfigError},
    core::{Arrival, CpuAction, Event, JobNum, Kernel, KernelEvent, SvcOp, Ticks},
    scheduler::Scheduler,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub disk_latency: Ticks,
    pub drum_latency: Ticks,
    /// Give up once the clock passes this point.
    pub time_limit: Ticks,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            disk_latency: 150,
            drum_latency: 100,
            time_limit: 10_000_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("job {0} requests I/O every 0 ticks")]
    ZeroIoInterval(JobNum),
    #[error("job number {0} appears twice in the workload")]
    DuplicateJob(JobNum),
    #[error("nothing left to deliver at t={now} with {outstanding} job(s) unfinished")]
    Stalled { now: Ticks, outstanding: usize },
    #[error("time limit {limit} passed with {outstanding} job(s) unfinished")]
    TimeLimit { limit: Ticks, outstanding: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy)]
struct Slice {
    job: JobNum,
    quantum: Ticks,
    started: Ticks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Timer,
    Svc(SvcOp),
    Disk,
    Drum,
    Arrival,
}

/// Reference driver: owns the clock, plays each job's script, and turns the
/// kernel's transfer requests into later completion interrupts.
pub struct Sim<S: Scheduler> {
    pub kernel: Kernel<S>,
    pub jobs: Vec<JobInstance>,
    // JobNum --> jobs[index]
    index: FxHashMap<JobNum, usize>,
    timing: Timing,
    job_cursor: usize,
    cpu: Option<Slice>,
    disk_done: Option<Ticks>,
    drum_done: Option<Ticks>,
}

impl<S: Scheduler> Sim<S> {
    pub fn new(mut jobs: Vec<Job>, config: Config, timing: Timing) -> Result<Self, SimError> {
        jobs.sort_by(|a, b| {
            a.arrival_time
                .cmp(&b.arrival_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut index = FxHashMap::default();
        for (idx, job) in jobs.iter().enumerate() {
            if job.io_every == Some(0) {
                return Err(SimError::ZeroIoInterval(job.id));
            }
            if index.insert(job.id, idx).is_some() {
                return Err(SimError::DuplicateJob(job.id));
            }
        }

        Ok(Self {
            kernel: Kernel::new(config)?,
            jobs: jobs.into_iter().map(JobInstance::new).collect(),
            index,
            timing,
            job_cursor: 0,
            cpu: None,
            disk_done: None,
            drum_done: None,
        })
    }

    pub fn run(&mut self) -> Result<(), SimError> {
        while !self.all_jobs_completed() {
            if !self.step()? {
                return Err(SimError::Stalled {
                    now: self.now(),
                    outstanding: self.outstanding(),
                });
            }
        }
        info!(
            "all {} jobs finished at t={} after {} events",
            self.jobs.len(),
            self.now(),
            self.kernel.observer().steps()
        );
        Ok(())
    }

    /// Delivers the next event. Returns `Ok(false)` when nothing is pending.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let Some((time, pending)) = self.next_event() else {
            return Ok(false);
        };
        if time > self.timing.time_limit {
            return Err(SimError::TimeLimit {
                limit: self.timing.time_limit,
                outstanding: self.outstanding(),
            });
        }

        let slice = self.cpu.take();
        if let Some(slice) = slice {
            let instance = self.instance_mut(slice.job);
            instance.cpu_used += time - slice.started;
        }

        let event = match pending {
            Pending::Timer => Event::TimerExpired { time },
            Pending::Svc(op) => {
                if let Some(slice) = slice {
                    self.script_svc(slice.job, op);
                }
                Event::Svc { op, time }
            }
            Pending::Disk => {
                self.disk_done = None;
                Event::DiskComplete { time }
            }
            Pending::Drum => {
                self.drum_done = None;
                Event::DrumComplete { time }
            }
            Pending::Arrival => {
                let job = &self.jobs[self.job_cursor].job;
                self.job_cursor += 1;
                Event::Arrival(Arrival {
                    job: job.id,
                    priority: job.priority,
                    size: job.size,
                    max_cpu: job.max_cpu,
                    time,
                })
            }
        };

        let action = self.kernel.handle(event);
        self.absorb(action, time);
        Ok(true)
    }

    /// Earliest pending event. At equal times CPU events go first, then
    /// disk, drum, and arrivals.
    fn next_event(&self) -> Option<(Ticks, Pending)> {
        let candidates = [
            self.cpu_event(),
            self.disk_done.map(|at| (at, Pending::Disk)),
            self.drum_done.map(|at| (at, Pending::Drum)),
            self.jobs
                .get(self.job_cursor)
                .map(|instance| (instance.job.arrival_time, Pending::Arrival)),
        ];
        candidates
            .into_iter()
            .flatten()
            .fold(None, |best: Option<(Ticks, Pending)>, candidate| match best {
                Some(best) if best.0 <= candidate.0 => Some(best),
                _ => Some(candidate),
            })
    }

    fn cpu_event(&self) -> Option<(Ticks, Pending)> {
        let slice = self.cpu?;
        let instance = self.instance(slice.job);
        if instance.wants_block {
            return Some((slice.started, Pending::Svc(SvcOp::Block)));
        }

        let timer = (slice.started + slice.quantum, Pending::Timer);
        if instance.exited {
            return Some(timer);
        }
        let (svc_cpu, op) = match instance.next_io_at {
            Some(io_at) if io_at < instance.job.run_time => (io_at, SvcOp::RequestIo),
            _ => (instance.job.run_time, SvcOp::Terminate),
        };
        let svc_at = slice.started + svc_cpu.saturating_sub(instance.cpu_used);
        if timer.0 <= svc_at {
            Some(timer)
        } else {
            Some((svc_at, Pending::Svc(op)))
        }
    }

    /// Advances the running job's script past the interrupt it is raising.
    fn script_svc(&mut self, job: JobNum, op: SvcOp) {
        let instance = self.instance_mut(job);
        match op {
            SvcOp::RequestIo => {
                if let (Some(at), Some(every)) = (instance.next_io_at, instance.job.io_every) {
                    instance.next_io_at = Some(at + every);
                }
                instance.wants_block = instance.job.blocks_on_io;
            }
            SvcOp::Block => instance.wants_block = false,
            SvcOp::Terminate => instance.exited = true,
        }
    }

    fn absorb(&mut self, action: CpuAction, now: Ticks) {
        for event in self.kernel.drain_events() {
            match event {
                KernelEvent::DiskTransfer { job } => {
                    debug_assert!(self.disk_done.is_none(), "disk already busy");
                    debug!("t={now} disk transfer for job {job}");
                    self.disk_done = Some(now + self.timing.disk_latency);
                }
                KernelEvent::DrumTransfer { job, direction, .. } => {
                    debug_assert!(self.drum_done.is_none(), "drum already busy");
                    debug!("t={now} drum transfer {direction:?} for job {job}");
                    self.drum_done = Some(now + self.timing.drum_latency);
                }
                KernelEvent::JobTerminated { job } => {
                    self.instance_mut(job).completion_time = Some(now);
                }
                KernelEvent::ArrivalRejected { job, .. } => {
                    self.instance_mut(job).rejected = true;
                }
            }
        }

        if let CpuAction::Run { job, quantum, .. } = action {
            self.instance_mut(job).start_time.get_or_insert(now);
            self.cpu = Some(Slice {
                job,
                quantum,
                started: now,
            });
        }
    }

    fn instance(&self, job: JobNum) -> &JobInstance {
        let idx = *self
            .index
            .get(&job)
            .expect("kernel named a job outside the workload");
        &self.jobs[idx]
    }

    fn instance_mut(&mut self, job: JobNum) -> &mut JobInstance {
        let idx = *self
            .index
            .get(&job)
            .expect("kernel named a job outside the workload");
        &mut self.jobs[idx]
    }

    pub fn now(&self) -> Ticks {
        self.kernel.now()
    }

    fn outstanding(&self) -> usize {
        self.jobs.iter().filter(|instance| !instance.done()).count()
    }

    pub fn all_jobs_completed(&self) -> bool {
        self.job_cursor == self.jobs.len() && self.jobs.iter().all(JobInstance::done)
    }

    /// Applies `f` to every job that ran to completion.
    pub fn jobs_map<T>(&self, f: impl Fn(&JobInstance) -> T) -> impl Iterator<Item = T> {
        self.jobs
            .iter()
            .filter(|instance| instance.completion_time.is_some())
            .map(f)
    }
}
