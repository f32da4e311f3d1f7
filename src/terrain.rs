//! Driver: seed grid plus repeated refinement.

use std::time::Instant;

use crate::config::TerrainConfig;
use crate::engine::RefinementEngine;
use crate::error::Result;
use crate::grid::{Grid, HeightRange};
use crate::random::ChaChaSource;

/// A finished heightmap, ready for a renderer.
#[derive(Clone, Debug)]
pub struct Terrain {
    pub grid: Grid,
    /// Seed the heights were drawn from
    pub seed: u64,
    pub range: HeightRange,
}

/// Runs a configured number of refinement iterations from a seed grid.
#[derive(Debug)]
pub struct TerrainGenerator {
    config: TerrainConfig,
    engine: RefinementEngine,
    source: ChaChaSource,
}

impl TerrainGenerator {
    pub fn new(config: TerrainConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let engine = RefinementEngine::with_workers(config.persistence, config.amplitude, config.workers)?;
        Ok(Self {
            config,
            engine,
            source: ChaChaSource::new(seed),
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// The resolved seed, including one picked at random.
    pub fn seed(&self) -> u64 {
        self.source.seed()
    }

    pub fn seed_grid(&self) -> Result<Grid> {
        Grid::allocate(self.config.seed_size, self.config.seed_fill, &self.source)
    }

    /// Every grid from the seed to the final one, lazily.
    pub fn levels(&self) -> Levels<'_> {
        Levels {
            generator: self,
            current: None,
            iteration: 0,
            failed: false,
        }
    }

    /// Run all iterations and return the final heightmap.
    pub fn generate(&self) -> Result<Terrain> {
        log::info!(
            "Generating terrain with seed {}: {}x{} seed grid, {} iterations, H = {}, {} workers",
            self.seed(),
            self.config.seed_size,
            self.config.seed_size,
            self.config.iterations,
            self.config.persistence,
            self.engine.workers()
        );
        let start = Instant::now();

        let mut grid = self.seed_grid()?;
        for iteration in 1..=self.config.iterations {
            grid = self.engine.refine(&grid, iteration, &self.source)?;
            log::debug!("Iteration {}: {}x{}", iteration, grid.size(), grid.size());
        }

        let range = grid.height_range();
        log::info!(
            "Generated {}x{} heightmap in {:.2?} (range {:.4} to {:.4})",
            grid.size(),
            grid.size(),
            start.elapsed(),
            range.min,
            range.max
        );
        Ok(Terrain {
            grid,
            seed: self.seed(),
            range,
        })
    }
}

/// Iterator over successive grids, starting with the seed grid.
pub struct Levels<'a> {
    generator: &'a TerrainGenerator,
    current: Option<Grid>,
    iteration: u32,
    failed: bool,
}

impl Iterator for Levels<'_> {
    type Item = Result<Grid>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.iteration > self.generator.config.iterations {
            return None;
        }
        let next = match &self.current {
            None => self.generator.seed_grid(),
            Some(grid) => self
                .generator
                .engine
                .refine(grid, self.iteration, &self.generator.source),
        };
        self.iteration += 1;
        match next {
            Ok(grid) => {
                self.current = Some(grid.clone());
                Some(Ok(grid))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
