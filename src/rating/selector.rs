//! Comparison candidate selection strategies.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Picks which existing rating is shown next.
///
/// `entry` chooses the first comparison among `len > 0` books. `redraw`
/// chooses a replacement inside `window`, never returning `exclude`, and
/// returns `None` when the window has no other candidate.
pub trait CandidateSelector: Send {
    fn entry(&mut self, len: usize) -> usize;

    fn redraw(&mut self, window: Range<usize>, exclude: usize) -> Option<usize>;
}

/// Uniform random selection. Seedable for reproducible runs.
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateSelector for RandomSelector {
    fn entry(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len.max(1))
    }

    fn redraw(&mut self, window: Range<usize>, exclude: usize) -> Option<usize> {
        let others = candidates(&window, exclude);
        if others == 0 {
            return None;
        }
        let pick = self.rng.gen_range(0..others);
        Some(nth_candidate(&window, exclude, pick))
    }
}

/// Always starts at the highest rated book and redraws the first other candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSelector;

impl CandidateSelector for FirstSelector {
    fn entry(&mut self, _len: usize) -> usize {
        0
    }

    fn redraw(&mut self, window: Range<usize>, exclude: usize) -> Option<usize> {
        (candidates(&window, exclude) > 0).then(|| nth_candidate(&window, exclude, 0))
    }
}

/// Starts in the middle of the list and redraws the middle of the remaining candidates.
#[derive(Debug, Default, Clone, Copy)]
pub struct MiddleSelector;

impl CandidateSelector for MiddleSelector {
    fn entry(&mut self, len: usize) -> usize {
        len / 2
    }

    fn redraw(&mut self, window: Range<usize>, exclude: usize) -> Option<usize> {
        let others = candidates(&window, exclude);
        (others > 0).then(|| nth_candidate(&window, exclude, others / 2))
    }
}

/// Which selector the engine is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    Random,
    First,
    Middle,
}

impl SelectionPolicy {
    pub fn build(self, seed: Option<u64>) -> Box<dyn CandidateSelector> {
        match self {
            Self::Random => match seed {
                Some(seed) => Box::new(RandomSelector::seeded(seed)),
                None => Box::new(RandomSelector::new()),
            },
            Self::First => Box::new(FirstSelector),
            Self::Middle => Box::new(MiddleSelector),
        }
    }
}

fn candidates(window: &Range<usize>, exclude: usize) -> usize {
    let len = window.len();
    if window.contains(&exclude) {
        len - 1
    } else {
        len
    }
}

/// The `n`th index of `window`, skipping `exclude`.
fn nth_candidate(window: &Range<usize>, exclude: usize, n: usize) -> usize {
    let idx = window.start + n;
    if window.contains(&exclude) && idx >= exclude {
        idx + 1
    } else {
        idx
    }
}
