use std::collections::VecDeque;

use crate::core::{JobNum, Words};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumEntry {
    pub job: JobNum,
    pub size: Words,
}

/// Jobs on the drum waiting for a core slot.
#[derive(Debug, Clone, Default)]
pub struct DrumQueue {
    entries: VecDeque<DrumEntry>,
}

impl DrumQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, job: JobNum, size: Words) {
        self.entries.push_back(DrumEntry { job, size });
    }

    pub fn front(&self) -> Option<DrumEntry> {
        self.entries.front().copied()
    }

    pub fn pop_front(&mut self) -> Option<DrumEntry> {
        self.entries.pop_front()
    }

    pub fn remove(&mut self, job: JobNum) -> bool {
        match self.entries.iter().position(|entry| entry.job == job) {
            Some(idx) => self.entries.remove(idx).is_some(),
            None => false,
        }
    }

    pub fn contains(&self, job: JobNum) -> bool {
        self.entries.iter().any(|entry| entry.job == job)
    }

    /// Smallest job first; equal sizes keep their arrival order.
    pub fn sort_by_size(&mut self) {
        self.entries.make_contiguous().sort_by_key(|entry| entry.size);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrumEntry> {
        self.entries.iter()
    }
}
