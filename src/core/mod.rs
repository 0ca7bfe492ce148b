pub mod driver;
pub mod event;
pub mod observer;
pub mod state;

pub use driver::{Charge, Kernel};
pub use event::{Arrival, CpuAction, Direction, Event, KernelEvent, SvcOp, UnknownSvc};
pub use observer::{InvariantViolation, Observer};
pub use state::{Address, JobNum, KernelCtx, Pcb, Termination, Ticks, Words};
