//! Column classification, convective expansion, and decomposition of the
//! reflectivity volume into convective and stratiform parts.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ConvStratConfig;
use crate::geometry::GridGeometry;
use crate::grid::{is_valid, Grid, MISSING_VALUE};
use crate::kernel::{sweep_rows, CircularKernel};

/// Echo category of a grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Category {
    /// No valid reflectivity in the column.
    #[default]
    Missing = 0,
    Stratiform = 1,
    Convective = 2,
}

impl Category {
    /// Byte value written to category grids.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a byte value from a category grid.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Missing),
            1 => Some(Self::Stratiform),
            2 => Some(Self::Convective),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Stratiform => "stratiform",
            Self::Convective => "convective",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify one column from its summary values.
///
/// Decision order:
/// 1. missing column max -> Missing
/// 2. column max >= definite-convection dBZ -> Convective
/// 3. column max < min valid dBZ -> Stratiform
/// 4. kernel coverage below threshold, or no texture -> Stratiform
/// 5. mean texture >= convective texture threshold -> Convective, else Stratiform
pub fn classify_column(
    col_max_dbz: f32,
    fraction_active: f32,
    mean_texture: f32,
    config: &ConvStratConfig,
) -> Category {
    if !is_valid(col_max_dbz) {
        return Category::Missing;
    }
    let dbz = col_max_dbz as f64;
    if dbz >= config.dbz_for_definite_convection {
        return Category::Convective;
    }
    if dbz < config.min_valid_dbz {
        return Category::Stratiform;
    }
    if !is_valid(fraction_active) || (fraction_active as f64) < config.min_valid_fraction_for_texture {
        return Category::Stratiform;
    }
    if is_valid(mean_texture) && mean_texture as f64 >= config.min_texture_for_convection {
        Category::Convective
    } else {
        Category::Stratiform
    }
}

/// Per-column classification before expansion.
pub fn classify(
    col_max: &Grid<f32>,
    fraction_active: &Grid<f32>,
    mean_texture: &Grid<f32>,
    config: &ConvStratConfig,
) -> Grid<Category> {
    let mut partition = Grid::plane(col_max.nx(), col_max.ny(), Category::Missing);
    let cells = partition
        .as_mut_slice()
        .iter_mut()
        .zip(col_max.as_slice())
        .zip(fraction_active.as_slice())
        .zip(mean_texture.as_slice());
    for (((out, &dbz), &frac), &tex) in cells {
        *out = classify_column(dbz, frac, tex, config);
    }
    partition
}

/// Grow convective columns outward by their own convective radius.
///
/// Every non-missing column within `radius_km[c]` of a convective column
/// `c` of `unexpanded` becomes convective. Each output cell gathers from
/// `unexpanded` only, so the result does not depend on visiting order.
/// Missing columns stay missing; a convective column whose radius is
/// missing covers only itself.
#[instrument(skip_all)]
pub fn expand_convective(
    unexpanded: &Grid<Category>,
    radius_km: &Grid<f32>,
    geometry: &GridGeometry,
    parallel: bool,
) -> Grid<Category> {
    let (nx, ny) = (unexpanded.nx(), unexpanded.ny());
    let categories = unexpanded.as_slice();
    let radii = radius_km.as_slice();

    let max_radius = categories
        .iter()
        .zip(radii)
        .filter(|(cat, r)| **cat == Category::Convective && is_valid(**r))
        .map(|(_, &r)| r as f64)
        .fold(0.0f64, f64::max);
    let kernel = CircularKernel::new(max_radius, geometry.dx_km(), geometry.dy_km());
    debug!(max_radius_km = max_radius, kernel_cells = kernel.len(), "Expansion kernel");

    let mut expanded = Grid::plane(nx, ny, Category::Missing);
    sweep_rows(expanded.as_mut_slice(), nx, parallel, |x, y| {
        let own = categories[y * nx + x];
        if own != Category::Stratiform {
            return own;
        }
        let covered = kernel.neighbours(x, y, nx, ny).any(|(idx, off)| {
            categories[idx] == Category::Convective
                && is_valid(radii[idx])
                && off.dist_km <= radii[idx] as f64 + 1.0e-6
        });
        if covered {
            Category::Convective
        } else {
            Category::Stratiform
        }
    });

    expanded
}

/// Split the reflectivity volume by the column partition.
///
/// The 2-D category is broadcast down each column: convective columns keep
/// their dBZ in the convective volume, stratiform columns in the stratiform
/// volume, and everything else is missing.
pub fn decompose(dbz: &Grid<f32>, partition: &Grid<Category>) -> (Grid<f32>, Grid<f32>) {
    let (nx, ny, nz) = (dbz.nx(), dbz.ny(), dbz.nz());
    let mut convective = Grid::filled(nx, ny, nz, MISSING_VALUE);
    let mut stratiform = Grid::filled(nx, ny, nz, MISSING_VALUE);
    let categories = partition.as_slice();

    for iz in 0..nz {
        let level = dbz.level(iz);
        let conv_level = convective.level_mut(iz);
        for ((out, &val), &cat) in conv_level.iter_mut().zip(level).zip(categories) {
            if cat == Category::Convective && is_valid(val) {
                *out = val;
            }
        }
        let strat_level = stratiform.level_mut(iz);
        for ((out, &val), &cat) in strat_level.iter_mut().zip(level).zip(categories) {
            if cat == Category::Stratiform && is_valid(val) {
                *out = val;
            }
        }
    }

    (convective, stratiform)
}

/// Column counts for a partition grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub missing: usize,
    pub stratiform: usize,
    pub convective: usize,
}

impl PartitionStats {
    pub fn from_grid(partition: &Grid<Category>) -> Self {
        let mut stats = Self::default();
        for cat in partition.as_slice() {
            match cat {
                Category::Missing => stats.missing += 1,
                Category::Stratiform => stats.stratiform += 1,
                Category::Convective => stats.convective += 1,
            }
        }
        stats
    }

    /// Columns with echo.
    pub fn echo(&self) -> usize {
        self.stratiform + self.convective
    }

    /// Fraction of echo columns that are convective (0.0 - 1.0).
    pub fn convective_fraction(&self) -> f64 {
        let echo = self.echo();
        if echo == 0 {
            0.0
        } else {
            self.convective as f64 / echo as f64
        }
    }
}
