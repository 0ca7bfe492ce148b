use serde::Deserialize;

use crate::core::{JobNum, Ticks, Words};

/// Scripted behaviour of one job, as the driver plays it out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    pub id: JobNum,
    #[serde(default)]
    pub priority: u32,
    pub size: Words,
    /// Burst declared at arrival; the kernel kills the job once it is spent.
    pub max_cpu: Ticks,
    pub arrival_time: Ticks,
    /// CPU time actually used before the job terminates itself.
    pub run_time: Ticks,
    /// Issue a disk request every this many ticks of CPU.
    #[serde(default)]
    pub io_every: Option<Ticks>,
    /// Block right after each disk request.
    #[serde(default)]
    pub blocks_on_io: bool,
}

#[derive(Debug, Clone)]
pub struct JobInstance {
    pub job: Job,
    pub start_time: Option<Ticks>,
    pub completion_time: Option<Ticks>,
    pub rejected: bool,
    pub cpu_used: Ticks,
    pub(crate) next_io_at: Option<Ticks>,
    pub(crate) wants_block: bool,
    pub(crate) exited: bool,
}

impl JobInstance {
    pub fn new(job: Job) -> Self {
        Self {
            next_io_at: job.io_every,
            job,
            start_time: None,
            completion_time: None,
            rejected: false,
            cpu_used: 0,
            wants_block: false,
            exited: false,
        }
    }

    pub fn done(&self) -> bool {
        self.completion_time.is_some() || self.rejected
    }
}
