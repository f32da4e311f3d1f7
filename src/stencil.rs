//! Per-cell rules of one refinement: anchor expansion and the two stencils.
//!
//! After [`expand`], a grid of side `2(n-1)+1` holds the old grid on its
//! even-even cells. The diamond stencil then fills the odd-odd cells from their
//! four diagonal anchors, and the square stencil fills the remaining
//! mixed-parity cells from their orthogonal neighbours, which are anchors and
//! diamond outputs. Each stencil only reads cells finished by an earlier pass.

use crate::error::{Result, TerrainError};
use crate::grid::{refined_size, Grid};

/// Diagonal offsets (NW, NE, SW, SE)
pub const DIAGONAL: [(isize, isize); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

/// Orthogonal offsets (W, E, N, S)
pub const ORTHOGONAL: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// The two interpolation sub-steps of a refinement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stencil {
    /// Odd-odd cells, averaged from diagonal anchors
    Diamond,
    /// Even-odd and odd-even cells, averaged from orthogonal neighbours
    Square,
}

impl Stencil {
    pub fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Stencil::Diamond => &DIAGONAL,
            Stencil::Square => &ORTHOGONAL,
        }
    }

    /// Whether `(x, y)` is written by this stencil.
    pub fn is_target(self, x: usize, y: usize) -> bool {
        match self {
            Stencil::Diamond => x % 2 == 1 && y % 2 == 1,
            Stencil::Square => (x + y) % 2 == 1,
        }
    }

    /// All cells of a grid of side `size` written by this stencil, row-major.
    pub fn targets(self, size: usize) -> Vec<(usize, usize)> {
        (0..size)
            .flat_map(|y| (0..size).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_target(x, y))
            .collect()
    }

    /// Mean of the in-bounds neighbours of `(x, y)` under this stencil.
    pub fn neighbor_average(self, grid: &Grid, x: usize, y: usize) -> Result<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (nx, ny) in grid.neighbors(x, y, self.offsets()) {
            sum += grid.get(nx, ny);
            count += 1;
        }
        if count == 0 {
            return Err(TerrainError::DegenerateNeighborhood { x, y });
        }
        Ok(sum / count as f64)
    }

    /// New value for `(x, y)`: neighbour mean plus the displacement.
    pub fn compute(self, grid: &Grid, x: usize, y: usize, offset: f64) -> Result<f64> {
        Ok(self.neighbor_average(grid, x, y)? + offset)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stencil::Diamond => "diamond",
            Stencil::Square => "square",
        }
    }
}

/// Target coordinates and value of the anchor copied from source cell `index`.
pub fn anchor(source: &Grid, index: usize) -> (usize, usize, f64) {
    let (x, y) = source.coords(index);
    (2 * x, 2 * y, source.as_slice()[index])
}

/// Copy every cell of `source` onto the even-even cells of `target`.
pub fn expand(source: &Grid, target: &mut Grid) -> Result<()> {
    check_expand_target(source, target)?;
    for index in 0..source.as_slice().len() {
        let (x, y, h) = anchor(source, index);
        target.set(x, y, h);
    }
    Ok(())
}

pub(crate) fn check_expand_target(source: &Grid, target: &Grid) -> Result<()> {
    let expected = refined_size(source.size());
    if target.size() != expected {
        return Err(TerrainError::DimensionMismatch {
            expected,
            found: target.size(),
            row: 0,
        });
    }
    Ok(())
}
