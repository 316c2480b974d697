use std::{collections::VecDeque, sync::Mutex};

use rand::Rng;

/// The two random draws the scheduler makes per round: which backend serves
/// the chunk, and how much jitter to add to the chunk size.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..len`. `len` is never zero; the registry refuses to
    /// be built empty.
    fn pick_index(&self, len: usize) -> usize;

    /// Uniform jitter in `0..=base`.
    fn chunk_jitter(&self, base: u32) -> u32;
}

/// Production source backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }

    fn chunk_jitter(&self, base: u32) -> u32 {
        rand::thread_rng().gen_range(0..=base)
    }
}

/// Deterministic source for tests: replays scripted draws, then falls back to
/// zero once a script is exhausted.
#[derive(Debug, Default)]
pub struct SequenceRandom {
    picks: Mutex<VecDeque<usize>>,
    jitters: Mutex<VecDeque<u32>>,
}

impl SequenceRandom {
    pub fn new(picks: Vec<usize>, jitters: Vec<u32>) -> Self {
        Self {
            picks: Mutex::new(picks.into()),
            jitters: Mutex::new(jitters.into()),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn pick_index(&self, len: usize) -> usize {
        let next = self
            .picks
            .lock()
            .map(|mut picks| picks.pop_front())
            .unwrap_or_default()
            .unwrap_or(0);
        next % len
    }

    fn chunk_jitter(&self, base: u32) -> u32 {
        let next = self
            .jitters
            .lock()
            .map(|mut jitters| jitters.pop_front())
            .unwrap_or_default()
            .unwrap_or(0);
        next.min(base)
    }
}
