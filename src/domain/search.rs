//! Parameter search strategies for the optimizer.
//!
//! A searcher proposes one assignment per trial over a fixed, ordered
//! space of quantized ranges and observes the loss afterwards. Searchers
//! are deterministic for a given seed so optimization runs reproduce.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::params::{ParamMap, ParamRange};

/// Ordered search dimensions. Order fixes iteration and sampling order
/// across trials.
pub type SearchSpace = Vec<(String, ParamRange)>;

pub trait Searcher {
    /// Propose the next assignment to evaluate.
    fn suggest(&mut self, space: &SearchSpace) -> ParamMap;

    /// Report the loss of the last suggested assignment. Searchers that
    /// do not adapt may ignore it.
    fn observe(&mut self, params: &ParamMap, loss: f64) {
        let _ = (params, loss);
    }
}

/// Uniform sampling over each range, snapped to the range's grid.
pub struct RandomSearch {
    rng: StdRng,
}

impl RandomSearch {
    pub fn seeded(seed: u64) -> Self {
        RandomSearch {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Searcher for RandomSearch {
    fn suggest(&mut self, space: &SearchSpace) -> ParamMap {
        space
            .iter()
            .map(|(name, range)| {
                let raw = self.rng.gen_range(range.low..=range.high);
                (name.clone(), range.quantize(raw))
            })
            .collect()
    }
}

/// Exhaustive sweep over the cartesian product of every range's grid,
/// first dimension fastest. Wraps around if asked for more trials than
/// the product holds.
pub struct GridSearch {
    cursor: usize,
}

impl GridSearch {
    pub fn new() -> Self {
        GridSearch { cursor: 0 }
    }

    /// Number of distinct assignments in the space.
    pub fn product_len(space: &SearchSpace) -> usize {
        space
            .iter()
            .map(|(_, range)| range.grid_len().max(1))
            .product()
    }
}

impl Default for GridSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl Searcher for GridSearch {
    fn suggest(&mut self, space: &SearchSpace) -> ParamMap {
        let mut remainder = self.cursor;
        self.cursor += 1;
        space
            .iter()
            .map(|(name, range)| {
                let len = range.grid_len().max(1);
                let index = remainder % len;
                remainder /= len;
                (name.clone(), range.grid_point(index))
            })
            .collect()
    }
}
