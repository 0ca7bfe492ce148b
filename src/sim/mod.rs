pub mod driver;
pub mod job;

pub use driver::{Sim, SimError, Timing};
pub use job::{Job, JobInstance};
