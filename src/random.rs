//! Random displacement for refinement passes.
//!
//! Every perturbation is drawn from an explicit [`OffsetSource`] handle keyed by
//! `(iteration, cell)`, so a cell's value never depends on which worker computed
//! it or in what order the pass ran.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};

/// A source of unit draws in `[-1, 1)`.
pub trait OffsetSource: Sync {
    /// Unit draw for one cell of one refinement pass.
    /// Iteration 0 is reserved for seed-grid noise.
    fn unit(&self, iteration: u32, cell: usize) -> f64;
}

/// Counter-based ChaCha8 source.
///
/// The iteration selects the stream and the cell index selects the word
/// position, so draws are reproducible from the seed alone.
#[derive(Clone, Debug)]
pub struct ChaChaSource {
    seed: u64,
    base: ChaCha8Rng,
}

impl ChaChaSource {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            base: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl OffsetSource for ChaChaSource {
    /// Each call clones the generator and seeks, which refills a full ChaCha
    /// keystream buffer for a single `f64`. That cost dominates a pass on large
    /// grids and is paid so draws stay independent of evaluation order.
    fn unit(&self, iteration: u32, cell: usize) -> f64 {
        let mut rng = self.base.clone();
        rng.set_stream(iteration as u64);
        // an f64 draw consumes two 32-bit words
        rng.set_word_pos(cell as u128 * 2);
        rng.gen::<f64>() * 2.0 - 1.0
    }
}

/// Source that always yields the same value. Useful to switch randomness off.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantSource(pub f64);

impl OffsetSource for ConstantSource {
    fn unit(&self, _iteration: u32, _cell: usize) -> f64 {
        self.0
    }
}

/// How displacement amplitude evolves with the iteration index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmplitudeLaw {
    /// `2^(-H * iter)`: finer levels get smaller perturbations
    #[default]
    Decay,
    /// `2^(H * iter)`: finer levels get larger perturbations
    Grow,
}

impl std::fmt::Display for AmplitudeLaw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decay => write!(f, "decay"),
            Self::Grow => write!(f, "grow"),
        }
    }
}

/// Scales unit draws by the per-iteration amplitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomOffset {
    persistence: f64,
    law: AmplitudeLaw,
}

impl RandomOffset {
    /// `persistence` must be positive and finite.
    pub fn new(persistence: f64, law: AmplitudeLaw) -> Result<Self> {
        if !persistence.is_finite() || persistence <= 0.0 {
            return Err(TerrainError::invalid_parameter(
                "persistence",
                format!("must be positive and finite, got {}", persistence),
            ));
        }
        Ok(Self { persistence, law })
    }

    pub fn persistence(&self) -> f64 {
        self.persistence
    }

    pub fn law(&self) -> AmplitudeLaw {
        self.law
    }

    /// Amplitude applied to unit draws on the given 1-based iteration.
    pub fn amplitude(&self, iteration: u32) -> f64 {
        let exponent = self.persistence * iteration as f64;
        match self.law {
            AmplitudeLaw::Decay => (-exponent).exp2(),
            AmplitudeLaw::Grow => exponent.exp2(),
        }
    }

    pub fn offset(&self, source: &dyn OffsetSource, iteration: u32, cell: usize) -> f64 {
        source.unit(iteration, cell) * self.amplitude(iteration)
    }
}
