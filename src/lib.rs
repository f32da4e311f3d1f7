//! Midpoint-displacement terrain library
//!
//! Grows a heightmap from a small seed grid by repeated diamond-square
//! refinement, each pass split across a fixed pool of worker threads.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod grid;
pub mod random;
pub mod stencil;
pub mod terrain;

pub use config::TerrainConfig;
pub use dispatch::Dispatcher;
pub use engine::{Phase, RefinementEngine};
pub use error::{Result, TerrainError};
pub use grid::{Grid, HeightRange, SeedFill};
pub use random::{AmplitudeLaw, ChaChaSource, ConstantSource, OffsetSource, RandomOffset};
pub use stencil::Stencil;
pub use terrain::{Terrain, TerrainGenerator};
