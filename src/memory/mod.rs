//! Core allocation: best-fit placement of drum-resident jobs, free-extent
//! consolidation, and swap-out of blocked jobs when core runs dry.

pub mod drum;
pub mod free_space;

use log::{debug, trace, warn};

pub use drum::{DrumEntry, DrumQueue};
pub use free_space::{Extent, FreeSpaceTable};

use crate::core::{Direction, KernelCtx};

/// One memory-manager pass, run by every handler before dispatch.
pub fn run_pass(ctx: &mut KernelCtx) {
    let merges = ctx.free_space.consolidate();
    if merges > 0 {
        trace!("consolidated {merges} free extent(s)");
    }
    ctx.free_space.sort_by_size();

    let Some(head) = ctx.drum_queue.front() else {
        return;
    };
    if ctx.drum_busy {
        return;
    }
    if ctx.job(head.job).is_none() {
        warn!("drum queue head {} is not in the directory; dropping", head.job);
        ctx.drum_queue.pop_front();
        return;
    }

    let Some(address) = ctx.free_space.allocate(head.size) else {
        debug!("no extent fits job {} ({}K)", head.job, head.size);
        swap_out(ctx);
        return;
    };

    if let Some(job) = ctx.job_mut(head.job) {
        job.address = Some(address);
    }
    ctx.drum_queue.pop_front();
    ctx.swapping = Some(head.job);
    ctx.drum_busy = true;
    debug!("swapping job {} in at {address} ({}K)", head.job, head.size);
    ctx.request_drum(head.job, head.size, address, Direction::DrumToCore);
}

/// Pushes the swap candidate back out to the drum, if it is safe to do so.
///
/// A candidate whose disk transfer is still in flight stays put; the next
/// pass retries.
pub fn swap_out(ctx: &mut KernelCtx) -> bool {
    let Some(num) = ctx.swap_candidate else {
        return false;
    };
    let Some(job) = ctx.jobs.get_mut(&num) else {
        ctx.swap_candidate = None;
        return false;
    };
    if !job.blocked || job.terminate_pending {
        ctx.swap_candidate = None;
        return false;
    }
    let Some(extent) = job.extent() else {
        ctx.swap_candidate = None;
        return false;
    };
    if job.latched {
        debug!("swap of job {num} deferred: it is latched on the disk");
        return false;
    }

    job.address = None;
    job.level = None;
    job.running = false;
    let size = job.size;

    ctx.free_space.release(extent);
    ctx.ready.remove(num);
    if ctx.running == Some(num) {
        ctx.running = None;
    }
    ctx.drum_queue.push_back(num, size);
    ctx.swapping = Some(num);
    ctx.drum_busy = true;
    ctx.swap_candidate = None;
    debug!("swapping job {num} out from {} ({size}K)", extent.address);
    ctx.request_drum(num, size, extent.address, Direction::CoreToDrum);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::{Arrival, KernelEvent};
    use crate::scheduler::Level;

    fn arrive(ctx: &mut KernelCtx, job: u64, size: u64, max_cpu: u64) {
        assert!(ctx.admit(&Arrival {
            job,
            priority: 0,
            size,
            max_cpu,
            time: 0,
        }));
    }

    /// Completes whatever drum transfer is in flight, enqueueing swap-ins at level 1.
    fn finish_drum(ctx: &mut KernelCtx) {
        ctx.drum_busy = false;
        if let Some(num) = ctx.swapping.take() {
            if let Some(job) = ctx.job_mut(num).filter(|job| job.in_core()) {
                job.level = Level::new(1);
                ctx.ready.push_back(Level::new(1).unwrap(), num);
            }
        }
    }

    #[test]
    fn pass_places_head_job() {
        let mut ctx = KernelCtx::new(Config::default());
        arrive(&mut ctx, 1, 40, 100);
        run_pass(&mut ctx);

        assert_eq!(ctx.job(1).unwrap().address, Some(0));
        assert!(ctx.drum_busy);
        assert_eq!(ctx.swapping, Some(1));
        assert!(ctx.drum_queue.is_empty());
        assert_eq!(ctx.free_space.extents(), &[Extent { size: 60, address: 40 }]);
        assert_eq!(
            ctx.drain_events(),
            vec![KernelEvent::DrumTransfer {
                job: 1,
                size: 40,
                address: 0,
                direction: Direction::DrumToCore,
            }]
        );
    }

    #[test]
    fn pass_waits_for_busy_drum() {
        let mut ctx = KernelCtx::new(Config::default());
        arrive(&mut ctx, 1, 40, 100);
        arrive(&mut ctx, 2, 20, 100);
        run_pass(&mut ctx);
        run_pass(&mut ctx);
        assert_eq!(ctx.drum_queue.len(), 1);
        assert!(!ctx.job(2).unwrap().in_core());

        finish_drum(&mut ctx);
        run_pass(&mut ctx);
        assert_eq!(ctx.job(2).unwrap().address, Some(40));
        assert_eq!(ctx.free_space.extents(), &[Extent { size: 40, address: 60 }]);
    }

    #[test]
    fn full_core_evicts_blocked_candidate() {
        let mut ctx = KernelCtx::new(Config::default());
        arrive(&mut ctx, 1, 70, 9000);
        run_pass(&mut ctx);
        finish_drum(&mut ctx);
        {
            let job = ctx.job_mut(1).unwrap();
            job.blocked = true;
            job.pending_io = 1;
        }
        ctx.swap_candidate = Some(1);

        arrive(&mut ctx, 2, 50, 100);
        ctx.drain_events();
        run_pass(&mut ctx);

        let evicted = ctx.job(1).unwrap();
        assert!(!evicted.in_core());
        assert!(!ctx.ready.contains(1));
        assert_eq!(ctx.swap_candidate, None);
        assert_eq!(ctx.swapping, Some(1));
        assert!(ctx.drum_busy);
        let queued: Vec<u64> = ctx.drum_queue.iter().map(|entry| entry.job).collect();
        assert_eq!(queued, vec![2, 1]);
        assert_eq!(ctx.free_space.total(), 100);
        assert_eq!(
            ctx.drain_events(),
            vec![KernelEvent::DrumTransfer {
                job: 1,
                size: 70,
                address: 0,
                direction: Direction::CoreToDrum,
            }]
        );

        finish_drum(&mut ctx);
        run_pass(&mut ctx);
        assert_eq!(ctx.job(2).unwrap().address, Some(0));
    }

    #[test]
    fn latched_candidate_is_not_evicted() {
        let mut ctx = KernelCtx::new(Config::default());
        arrive(&mut ctx, 1, 70, 9000);
        run_pass(&mut ctx);
        finish_drum(&mut ctx);
        {
            let job = ctx.job_mut(1).unwrap();
            job.blocked = true;
            job.latched = true;
            job.pending_io = 1;
        }
        ctx.swap_candidate = Some(1);
        arrive(&mut ctx, 2, 50, 100);

        run_pass(&mut ctx);
        assert!(ctx.job(1).unwrap().in_core());
        assert_eq!(ctx.swap_candidate, Some(1));
        assert!(!ctx.drum_busy);

        ctx.job_mut(1).unwrap().latched = false;
        run_pass(&mut ctx);
        assert!(!ctx.job(1).unwrap().in_core());
    }

    #[test]
    fn stale_candidate_is_cleared() {
        let mut ctx = KernelCtx::new(Config::default());
        arrive(&mut ctx, 1, 70, 9000);
        run_pass(&mut ctx);
        finish_drum(&mut ctx);
        ctx.swap_candidate = Some(1);
        arrive(&mut ctx, 2, 50, 100);

        run_pass(&mut ctx);
        assert_eq!(ctx.swap_candidate, None);
        assert!(ctx.job(1).unwrap().in_core());
        assert!(!ctx.job(2).unwrap().in_core());
    }
}
