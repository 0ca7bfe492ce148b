use average::Estimate;
use drum_sim::{Config, Job, MultilevelScheduler, Sim, Timing};
use rand::prelude::*;

fn main() {
    env_logger::init();

    let jobs = bernoulli_jobs(60_000, 0.002, 0.4, 0);
    let mut sim = match Sim::<MultilevelScheduler>::new(jobs, Config::default(), Timing::default())
    {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("bad workload: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = sim.run() {
        eprintln!("simulation failed: {err}");
        std::process::exit(1);
    }

    let response_times = sim.jobs_map(|j| (j.start_time.unwrap_or(0) - j.job.arrival_time) as f64);
    let turnaround_times =
        sim.jobs_map(|j| (j.completion_time.unwrap_or(0) - j.job.arrival_time) as f64);
    let rejected = sim.jobs.iter().filter(|j| j.rejected).count();

    println!("Jobs: {} ({} rejected)", sim.jobs.len(), rejected);
    println!("Finished at t={}", sim.now());
    println!("Average response time: {:.2} ticks", avg(response_times));
    println!("Average turnaround time: {:.2} ticks", avg(turnaround_times));
}

/// Random batch mix: each tick a job arrives with probability `p_arrival`;
/// `p_io` of them are interactive and block on regular disk requests.
fn bernoulli_jobs(ticks: u64, p_arrival: f64, p_io: f64, seed: u64) -> Vec<Job> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut jobs = Vec::new();

    for t in 0..ticks {
        if rng.random::<f64>() < p_arrival {
            let max_cpu = rng.random_range(200..9_000);
            let run_time = rng.random_range(max_cpu / 2..=max_cpu);
            let io_every = (rng.random::<f64>() < p_io).then(|| rng.random_range(100..800));

            jobs.push(Job {
                id: jobs.len() as u64 + 1,
                priority: rng.random_range(1..=5),
                size: rng.random_range(2..=40),
                max_cpu,
                arrival_time: t,
                run_time,
                io_every,
                blocks_on_io: io_every.is_some() && rng.random::<bool>(),
            });
        }
    }

    jobs
}

fn avg(iter: impl Iterator<Item = f64>) -> f64 {
    iter.collect::<average::Mean>().estimate()
}
