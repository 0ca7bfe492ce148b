use std::collections::VecDeque;

use super::{LEVELS, Level};
use crate::core::JobNum;

#[derive(Debug, Clone, Default)]
pub struct ReadyQueues {
    levels: [VecDeque<JobNum>; LEVELS],
}

impl ReadyQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, level: Level, job: JobNum) {
        debug_assert!(!self.contains(job), "job {job} already ready");
        self.levels[level.index()].push_back(job);
    }

    /// Drops the job from whichever level holds it.
    pub fn remove(&mut self, job: JobNum) -> Option<Level> {
        for level in Level::all() {
            let queue = &mut self.levels[level.index()];
            if let Some(idx) = queue.iter().position(|&queued| queued == job) {
                queue.remove(idx);
                return Some(level);
            }
        }
        None
    }

    pub fn front(&self, level: Level) -> Option<JobNum> {
        self.levels[level.index()].front().copied()
    }

    /// Moves the head of `level` to its tail.
    pub fn rotate(&mut self, level: Level) {
        let queue = &mut self.levels[level.index()];
        if let Some(job) = queue.pop_front() {
            queue.push_back(job);
        }
    }

    pub fn first_non_empty(&self) -> Option<Level> {
        Level::all().find(|level| !self.levels[level.index()].is_empty())
    }

    pub fn contains(&self, job: JobNum) -> bool {
        self.levels.iter().any(|queue| queue.contains(&job))
    }

    pub fn len(&self, level: Level) -> usize {
        self.levels[level.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(VecDeque::is_empty)
    }

    /// Every ready job, level 1 first, in queue order.
    pub fn iter(&self) -> impl Iterator<Item = (Level, JobNum)> + '_ {
        Level::all().flat_map(move |level| {
            self.levels[level.index()]
                .iter()
                .map(move |&job| (level, job))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(n: u8) -> Level {
        Level::new(n).unwrap()
    }

    #[test]
    fn first_non_empty_prefers_low_levels() {
        let mut ready = ReadyQueues::new();
        assert_eq!(ready.first_non_empty(), None);
        ready.push_back(level(4), 1);
        ready.push_back(level(2), 2);
        assert_eq!(ready.first_non_empty(), Some(level(2)));
        assert_eq!(ready.front(level(2)), Some(2));
    }

    #[test]
    fn rotate_and_remove() {
        let mut ready = ReadyQueues::new();
        ready.push_back(level(1), 1);
        ready.push_back(level(1), 2);
        ready.push_back(level(3), 3);

        ready.rotate(level(1));
        assert_eq!(ready.front(level(1)), Some(2));
        assert_eq!(
            ready.iter().collect::<Vec<_>>(),
            vec![(level(1), 2), (level(1), 1), (level(3), 3)]
        );

        assert_eq!(ready.remove(3), Some(level(3)));
        assert_eq!(ready.remove(3), None);
        assert_eq!(ready.len(level(1)), 2);
        assert!(!ready.is_empty());
    }
}
