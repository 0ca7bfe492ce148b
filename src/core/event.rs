use thiserror::Error;

use crate::core::{Address, JobNum, Ticks, Words};

/// Parameters delivered with a job arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    pub job: JobNum,
    pub priority: u32,
    pub size: Words,
    pub max_cpu: Ticks,
    pub time: Ticks,
}

/// Software interrupt requested by the running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvcOp {
    Terminate,
    RequestIo,
    /// Block until every outstanding I/O request of the job has completed.
    Block,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown software interrupt code {0}")]
pub struct UnknownSvc(pub i64);

impl TryFrom<i64> for SvcOp {
    type Error = UnknownSvc;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            5 => Ok(Self::Terminate),
            6 => Ok(Self::RequestIo),
            7 => Ok(Self::Block),
            other => Err(UnknownSvc(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Arrival(Arrival),
    DiskComplete { time: Ticks },
    DrumComplete { time: Ticks },
    TimerExpired { time: Ticks },
    Svc { op: SvcOp, time: Ticks },
}

impl Event {
    pub fn time(&self) -> Ticks {
        match *self {
            Self::Arrival(arrival) => arrival.time,
            Self::DiskComplete { time }
            | Self::DrumComplete { time }
            | Self::TimerExpired { time }
            | Self::Svc { time, .. } => time,
        }
    }
}

/// What the CPU should do once a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuAction {
    Idle,
    Run {
        job: JobNum,
        address: Address,
        size: Words,
        quantum: Ticks,
    },
}

impl CpuAction {
    pub fn code(&self) -> u8 {
        match self {
            Self::Idle => 1,
            Self::Run { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    CoreToDrum,
    DrumToCore,
}

/// Outbound requests and notices, drained by the driver after each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelEvent {
    DiskTransfer {
        job: JobNum,
    },
    DrumTransfer {
        job: JobNum,
        size: Words,
        address: Address,
        direction: Direction,
    },
    JobTerminated {
        job: JobNum,
    },
    ArrivalRejected {
        job: JobNum,
        size: Words,
    },
}
