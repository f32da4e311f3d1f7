//! Terrain generation configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};
use crate::grid::{check_size, is_valid_size, refined_size, SeedFill};
use crate::random::AmplitudeLaw;

/// Inputs of a generation run. Loadable from JSON; missing fields take defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Side of the seed grid, must be 2^k + 1 (default: 2)
    #[serde(default = "default_seed_size")]
    pub seed_size: usize,

    /// Number of refinement iterations (default: 11)
    /// A seed of side 2 refined 11 times gives a 2049x2049 grid.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Roughness exponent H (default: 0.8)
    /// Higher values shrink the displacement faster, giving smoother terrain
    #[serde(default = "default_persistence")]
    pub persistence: f64,

    /// Worker threads per pass (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// RNG seed. A random seed is picked when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Initial contents of the seed grid
    #[serde(default)]
    pub seed_fill: SeedFill,

    /// Whether displacement shrinks or grows with iteration
    #[serde(default)]
    pub amplitude: AmplitudeLaw,
}

fn default_seed_size() -> usize {
    2
}
fn default_iterations() -> u32 {
    11
}
fn default_persistence() -> f64 {
    0.8
}
fn default_workers() -> usize {
    4
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed_size: default_seed_size(),
            iterations: default_iterations(),
            persistence: default_persistence(),
            workers: default_workers(),
            seed: None,
            seed_fill: SeedFill::default(),
            amplitude: AmplitudeLaw::default(),
        }
    }
}

impl TerrainConfig {
    /// Parse a JSON config and validate it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        check_size(self.seed_size)?;
        if !self.persistence.is_finite() || self.persistence <= 0.0 {
            return Err(TerrainError::invalid_parameter(
                "persistence",
                format!("must be positive and finite, got {}", self.persistence),
            ));
        }
        if self.workers == 0 {
            return Err(TerrainError::invalid_parameter("workers", "must be at least 1"));
        }
        self.checked_final_size().ok_or_else(|| {
            TerrainError::invalid_parameter(
                "iterations",
                format!("{} iterations exceed the largest allocatable grid", self.iterations),
            )
        })?;
        Ok(())
    }

    /// Side of the grid after all iterations.
    pub fn final_size(&self) -> usize {
        (0..self.iterations).fold(self.seed_size, |size, _| refined_size(size))
    }

    fn checked_final_size(&self) -> Option<usize> {
        (0..self.iterations).try_fold(self.seed_size, |size, _| {
            let side = size.checked_sub(1)?.checked_mul(2)?.checked_add(1)?;
            is_valid_size(side).then_some(side)
        })
    }
}
