use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};
use crate::random::OffsetSource;

/// Initial contents of a freshly allocated seed grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedFill {
    /// Every cell starts at 0.0
    #[default]
    Zero,
    /// Every cell is an independent draw in [-1, 1)
    Noise,
}

impl std::fmt::Display for SeedFill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zero => write!(f, "zero"),
            Self::Noise => write!(f, "noise"),
        }
    }
}

/// Whether `size` is of the form `2^k + 1` (2, 3, 5, 9, ...) and a grid of
/// that side fits in memory addressable by a `Vec<f64>`.
pub fn is_valid_size(size: usize) -> bool {
    size >= 2 && (size - 1).is_power_of_two() && grid_bytes(size).is_some()
}

/// Bytes needed for a grid of side `size`, if it stays within `isize::MAX`.
fn grid_bytes(size: usize) -> Option<usize> {
    size.checked_mul(size)?
        .checked_mul(std::mem::size_of::<f64>())
        .filter(|&bytes| bytes <= isize::MAX as usize)
}

/// Side of the grid produced by one refinement of a grid of side `size`.
pub fn refined_size(size: usize) -> usize {
    2 * (size - 1) + 1
}

pub(crate) fn check_size(size: usize) -> Result<()> {
    if is_valid_size(size) {
        Ok(())
    } else {
        Err(TerrainError::InvalidSize { size })
    }
}

/// A square grid of heights, side `2^k + 1`, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    size: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Allocate a seed grid. Noise draws use iteration 0 of `source`.
    pub fn allocate(size: usize, fill: SeedFill, source: &dyn OffsetSource) -> Result<Self> {
        check_size(size)?;
        let data = match fill {
            SeedFill::Zero => vec![0.0; size * size],
            SeedFill::Noise => (0..size * size).map(|idx| source.unit(0, idx)).collect(),
        };
        Ok(Self { size, data })
    }

    /// Allocate a zero-filled grid.
    pub fn zeros(size: usize) -> Result<Self> {
        check_size(size)?;
        Ok(Self::filled(size, 0.0))
    }

    /// Unchecked allocation; callers have already validated `size`.
    pub(crate) fn filled(size: usize, value: f64) -> Self {
        Self {
            size,
            data: vec![value; size * size],
        }
    }

    /// Build a grid from rows, where `rows[y][x]` is the height at `(x, y)`.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let size = rows.len();
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != size {
                return Err(TerrainError::DimensionMismatch {
                    expected: size,
                    found: cells.len(),
                    row,
                });
            }
        }
        check_size(size)?;
        Ok(Self {
            size,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Rows of the grid, `rows[y][x]`.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.size).map(|row| row.to_vec()).collect()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Flat index of `(x, y)`. This is also the cell key used for random draws.
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.size + x
    }

    pub fn coords(&self, index: usize) -> (usize, usize) {
        (index % self.size, index / self.size)
    }

    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[self.index(x, y)]
    }

    pub(crate) fn set(&mut self, x: usize, y: usize, value: f64) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// In-bounds cells at the given offsets from `(x, y)`. No wrapping.
    pub fn neighbors(
        &self,
        x: usize,
        y: usize,
        offsets: &'static [(isize, isize)],
    ) -> impl Iterator<Item = (usize, usize)> {
        let size = self.size;
        offsets.iter().filter_map(move |&(dx, dy)| {
            let nx = x.checked_add_signed(dx)?;
            let ny = y.checked_add_signed(dy)?;
            (nx < size && ny < size).then_some((nx, ny))
        })
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.data.iter().enumerate().map(move |(idx, &val)| {
            let (x, y) = self.coords(idx);
            (x, y, val)
        })
    }

    /// Observed minimum and maximum height.
    pub fn height_range(&self) -> HeightRange {
        let mut min_h = f64::MAX;
        let mut max_h = f64::MIN;
        for &h in &self.data {
            if h < min_h { min_h = h; }
            if h > max_h { max_h = h; }
        }
        HeightRange { min: min_h, max: max_h }
    }

    /// First cell that is NaN or infinite, if any.
    pub(crate) fn first_non_finite(&self) -> Option<(usize, usize)> {
        self.data
            .iter()
            .position(|h| !h.is_finite())
            .map(|idx| self.coords(idx))
    }
}

/// Height extent of a finished grid, used by renderers to map cells linearly.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightRange {
    pub min: f64,
    pub max: f64,
}

impl HeightRange {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Map a height into [0, 1]. A flat grid maps everything to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.span();
        if span > 0.0 {
            ((value - self.min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
