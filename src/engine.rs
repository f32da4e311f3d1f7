//! One refinement iteration: `n -> 2(n-1)+1`.
//!
//! Phases run strictly in order, `Expanding -> DiamondPass -> SquarePass -> Done`.
//! During a phase every worker reads the grid as committed at the previous
//! barrier and returns new cell values; they are written back only after the
//! whole phase has joined, so no phase ever observes a partial one.

use crate::dispatch::Dispatcher;
use crate::error::{Result, TerrainError};
use crate::grid::{check_size, refined_size, Grid};
use crate::random::{AmplitudeLaw, OffsetSource, RandomOffset};
use crate::stencil::{anchor, check_expand_target, Stencil};

/// Refinement phase, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Expanding,
    DiamondPass,
    SquarePass,
    Done,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Expanding => Some(Phase::DiamondPass),
            Phase::DiamondPass => Some(Phase::SquarePass),
            Phase::SquarePass => Some(Phase::Done),
            Phase::Done => None,
        }
    }
}

/// Runs refinement iterations on a fixed worker pool.
#[derive(Debug)]
pub struct RefinementEngine {
    offset: RandomOffset,
    dispatcher: Dispatcher,
}

impl RefinementEngine {
    pub fn new(offset: RandomOffset, dispatcher: Dispatcher) -> Self {
        Self { offset, dispatcher }
    }

    /// Build an engine with its own pool of `workers` threads.
    pub fn with_workers(persistence: f64, law: AmplitudeLaw, workers: usize) -> Result<Self> {
        Ok(Self::new(
            RandomOffset::new(persistence, law)?,
            Dispatcher::new(workers)?,
        ))
    }

    pub fn offset(&self) -> &RandomOffset {
        &self.offset
    }

    pub fn workers(&self) -> usize {
        self.dispatcher.workers()
    }

    /// Produce the next, finer grid. `iteration` is 1-based and sets the
    /// displacement amplitude. The input grid is never modified.
    pub fn refine(&self, grid: &Grid, iteration: u32, source: &dyn OffsetSource) -> Result<Grid> {
        if iteration == 0 {
            return Err(TerrainError::invalid_parameter(
                "iteration",
                "refinement iterations are numbered from 1",
            ));
        }
        check_size(grid.size())?;
        let next_size = refined_size(grid.size());
        check_size(next_size)?;

        let mut next = Grid::filled(next_size, f64::NAN);
        let mut phase = Some(Phase::Expanding);
        while let Some(current) = phase {
            log::trace!("iteration {} ({} -> {}): {:?}", iteration, grid.size(), next_size, current);
            match current {
                Phase::Expanding => self.expand_pass(grid, &mut next)?,
                Phase::DiamondPass => self.stencil_pass(Stencil::Diamond, &mut next, iteration, source)?,
                Phase::SquarePass => self.stencil_pass(Stencil::Square, &mut next, iteration, source)?,
                Phase::Done => {}
            }
            phase = current.next();
        }

        if let Some((x, y)) = next.first_non_finite() {
            return Err(TerrainError::NonFiniteCell { x, y });
        }
        Ok(next)
    }

    fn expand_pass(&self, source: &Grid, target: &mut Grid) -> Result<()> {
        check_expand_target(source, target)?;
        let anchors = self
            .dispatcher
            .run_partitioned(source.as_slice().len(), |index| Ok(anchor(source, index)))?;
        for (x, y, h) in anchors {
            target.set(x, y, h);
        }
        Ok(())
    }

    fn stencil_pass(
        &self,
        stencil: Stencil,
        grid: &mut Grid,
        iteration: u32,
        source: &dyn OffsetSource,
    ) -> Result<()> {
        let targets = stencil.targets(grid.size());
        let values = {
            let snapshot: &Grid = grid;
            self.dispatcher.run_partitioned(targets.len(), |i| {
                let (x, y) = targets[i];
                let offset = self.offset.offset(source, iteration, snapshot.index(x, y));
                stencil.compute(snapshot, x, y, offset)
            })?
        };
        log::trace!("{} pass wrote {} cells", stencil.name(), values.len());
        for (&(x, y), h) in targets.iter().zip(values) {
            grid.set(x, y, h);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{ChaChaSource, ConstantSource};
    use proptest::prelude::*;

    fn engine(workers: usize) -> RefinementEngine {
        RefinementEngine::with_workers(0.8, AmplitudeLaw::Decay, workers).unwrap()
    }

    fn bump() -> Grid {
        Grid::from_rows(vec![
            vec![0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_phase_order() {
        let mut phases = vec![Phase::Expanding];
        while let Some(p) = phases.last().and_then(|p| p.next()) {
            phases.push(p);
        }
        assert_eq!(
            phases,
            vec![Phase::Expanding, Phase::DiamondPass, Phase::SquarePass, Phase::Done]
        );
    }

    #[test]
    fn test_with_workers_carries_parameters() {
        let engine = RefinementEngine::with_workers(1.5, AmplitudeLaw::Grow, 3).unwrap();
        assert_eq!(engine.offset().persistence(), 1.5);
        assert_eq!(engine.offset().law(), AmplitudeLaw::Grow);
        assert_eq!(engine.offset().amplitude(2), 8.0);
        assert_eq!(engine.workers(), 3);
    }

    #[test]
    fn test_bump_with_zero_offsets() {
        let engine = RefinementEngine::with_workers(1.0, AmplitudeLaw::Decay, 2).unwrap();
        let next = engine.refine(&bump(), 1, &ConstantSource(0.0)).unwrap();

        assert_eq!(next.size(), 5);
        assert_eq!(next.get(0, 0), 0.0);
        assert_eq!(next.get(4, 4), 0.0);
        assert_eq!(next.get(2, 2), 1.0);
        // (2, 0) is an anchor copied from (1, 0)
        assert_eq!(next.get(2, 0), 0.0);

        // Diamond cells see the centre bump once among four corners
        assert_eq!(next.get(1, 1), 0.25);
        assert_eq!(next.get(3, 3), 0.25);
        // Square cell next to the bump: (1,2) sees 0, 1, 0.25, 0.25
        assert_eq!(next.get(1, 2), 0.375);
        // Boundary square cell: (1,0) sees 0, 0, 0.25
        assert!((next.get(1, 0) - 0.25 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_input_grid_is_untouched() {
        let grid = bump();
        let before = grid.clone();
        engine(4).refine(&grid, 1, &ChaChaSource::new(3)).unwrap();
        assert_eq!(grid, before);
    }

    #[test]
    fn test_anchors_survive_exactly() {
        let source = ChaChaSource::new(99);
        let seed = Grid::allocate(9, crate::grid::SeedFill::Noise, &source).unwrap();
        let next = engine(3).refine(&seed, 4, &source).unwrap();
        for (x, y, h) in seed.iter() {
            assert_eq!(next.get(2 * x, 2 * y).to_bits(), h.to_bits());
        }
    }

    #[test]
    fn test_offsets_are_bounded_by_amplitude() {
        let engine = RefinementEngine::with_workers(1.0, AmplitudeLaw::Decay, 2).unwrap();
        let flat = Grid::zeros(5).unwrap();
        let next = engine.refine(&flat, 2, &ChaChaSource::new(5)).unwrap();
        // Diamond cells average zeros, so they hold the raw offset
        for (x, y) in Stencil::Diamond.targets(next.size()) {
            assert!(next.get(x, y).abs() <= 0.25);
        }
        assert!(next.iter().all(|(_, _, h)| h.abs() <= 0.5));
    }

    #[test]
    fn test_sequential_sizes() {
        let engine = engine(2);
        let source = ChaChaSource::new(1);
        let g1 = engine.refine(&bump(), 1, &source).unwrap();
        let g2 = engine.refine(&g1, 2, &source).unwrap();
        assert_eq!(g1.size(), 5);
        assert_eq!(g2.size(), 9);
    }

    #[test]
    fn test_rejects_iteration_zero() {
        let err = engine(1).refine(&bump(), 0, &ConstantSource(0.0)).unwrap_err();
        assert!(matches!(err, TerrainError::InvalidParameter { name: "iteration", .. }));
    }

    #[test]
    fn test_overflow_is_reported() {
        let engine = RefinementEngine::with_workers(2000.0, AmplitudeLaw::Grow, 1).unwrap();
        let err = engine.refine(&bump(), 1, &ConstantSource(0.5)).unwrap_err();
        assert!(matches!(err, TerrainError::NonFiniteCell { .. }));
    }

    #[test]
    fn test_worker_count_does_not_change_output() {
        let source = ChaChaSource::new(2024);
        let mut one = Grid::zeros(3).unwrap();
        let mut many = one.clone();
        let (e1, e8) = (engine(1), engine(8));
        for iteration in 1..=4 {
            one = e1.refine(&one, iteration, &source).unwrap();
            many = e8.refine(&many, iteration, &source).unwrap();
        }
        let bits = |g: &Grid| g.as_slice().iter().map(|h| h.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&one), bits(&many));
    }

    proptest! {
        #[test]
        fn refine_covers_every_cell(k in 0u32..5, seed in any::<u64>(), workers in 1usize..6) {
            let size = (1usize << k) + 1;
            let source = ChaChaSource::new(seed);
            let grid = Grid::allocate(size, crate::grid::SeedFill::Noise, &source).unwrap();
            let next = engine(workers).refine(&grid, 1, &source).unwrap();
            prop_assert_eq!(next.size(), 2 * (size - 1) + 1);
            prop_assert!(next.iter().all(|(_, _, h)| h.is_finite()));
        }
    }
}
