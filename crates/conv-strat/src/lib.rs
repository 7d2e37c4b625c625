//! Convective/Stratiform Partitioning of Radar Reflectivity
//!
//! This crate classifies each column of a gridded 3-D reflectivity volume
//! as convective, stratiform, or missing. It combines:
//!
//! - **Column maximum**: peak dBZ within a valid height band
//! - **Texture**: local spread of dBZ inside a circular kernel
//! - **Background**: kernel-mean column max, driving a convective radius
//! - **Echo type**: texture-derived convectivity, clumped in 3-D and typed
//!   by height (shallow, mid, deep, elevated convection; low, mid, high
//!   stratiform)
//!
//! # Architecture
//!
//! ```text
//! dBZ volume (nx * ny * nz, x fastest)
//!      │
//!      ├─► column max over [min_valid_ht, max_valid_ht]
//!      │         │
//!      │         ├─► background mean ─► convective radius ramp
//!      │         │
//!      │         └─► fraction active (texture kernel)
//!      │
//!      ├─► texture per level ─► mean / max column texture
//!      │         │
//!      │         └─► convectivity ─► 3-D clumps ─► echo type (3-D, column)
//!      │
//!      └─► classify columns
//!               │
//!               ├─► expand convective cores by their radius
//!               │
//!               ├─► split dBZ into convective / stratiform volumes
//!               │
//!               └─► echo tops, convective and stratiform tops
//! ```
//!
//! # Example
//!
//! ```ignore
//! use conv_strat::{Category, ConvStratFinder, MISSING_VALUE};
//!
//! let mut finder = ConvStratFinder::new();
//! finder.set_grid(nx, ny, 1.0, 1.0, 0.0, 0.0, z_km, false)?;
//! finder.compute_partition(&dbz, MISSING_VALUE)?;
//!
//! if let Some(partition) = finder.partition() {
//!     let n_conv = partition
//!         .as_slice()
//!         .iter()
//!         .filter(|c| **c == Category::Convective)
//!         .count();
//! }
//! ```

pub mod background;
pub mod config;
pub mod echo_type;
pub mod error;
pub mod finder;
pub mod geometry;
pub mod grid;
pub mod kernel;
pub mod partition;
pub mod radius;
pub mod texture;
pub mod tops;

// Re-export commonly used types at crate root
pub use config::{ConvRadiusConfig, ConvStratConfig, EchoTypeConfig};
pub use echo_type::{EchoType, HeightThresholds, StormClump};
pub use error::{ConvStratError, Result};
pub use finder::{ConvStratFinder, PartitionOutputs};
pub use geometry::{GridGeometry, KM_PER_DEG_AT_EQ};
pub use grid::{is_missing, is_valid, Grid, MissingValue, MISSING_VALUE};
pub use kernel::{CircularKernel, KernelCache};
pub use partition::{Category, PartitionStats};
pub use radius::ConvectiveRadiusFunction;
